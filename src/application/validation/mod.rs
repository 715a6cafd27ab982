pub mod listing;
pub mod offer;
pub mod scheduler;

pub use listing::ListingValidator;
pub use offer::OfferValidator;
pub use scheduler::ValidationScheduler;

use rand::Rng;

/// Injectable randomness for the on-chain ownership sampling
///
/// The sampling probability stays a plain parameter so tests can pin the
/// outcome instead of fighting a thread-local RNG.
pub trait SampleSource: Send + Sync {
    fn should_sample(&self, rate: f64) -> bool;
}

/// Production sampler backed by the thread RNG
pub struct ThreadRngSampler;

impl SampleSource for ThreadRngSampler {
    fn should_sample(&self, rate: f64) -> bool {
        rand::thread_rng().gen_bool(rate.clamp(0.0, 1.0))
    }
}

/// Fixed-outcome sampler for tests
pub struct FixedSampler(pub bool);

impl SampleSource for FixedSampler {
    fn should_sample(&self, _rate: f64) -> bool {
        self.0
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    use crate::config::ValidationConfig;
    use crate::infrastructure::ethereum::{ChainReader, MulticallOutcome};
    use crate::infrastructure::ethereum::EthereumClientError;
    use crate::infrastructure::persistence::repositories::{
        ActivityRepository, AssetRepository, GroupStatsRepository, ListingRepository,
        OfferRepository, Repositories, ValidationStateRepository,
    };

    /// Repositories over a mock connection, for tests that never reach it
    pub fn mock_repositories() -> Arc<Repositories> {
        let conn = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        Arc::new(Repositories::new(
            ActivityRepository::new(conn.clone(), 300),
            AssetRepository::new(conn.clone()),
            GroupStatsRepository::new(conn.clone()),
            ListingRepository::new(conn.clone()),
            OfferRepository::new(conn.clone()),
            ValidationStateRepository::new(conn),
        ))
    }

    pub fn test_config() -> ValidationConfig {
        ValidationConfig {
            batch_size: 100,
            interval_ms: 60_000,
            offer_interval_ms: 300_000,
            unfunded_interval_ms: 600_000,
            unfunded_max_age_secs: 14 * 24 * 3600,
            ownership_sample_rate: 0.10,
        }
    }

    /// Chain reader returning scripted results
    pub struct ScriptedChain {
        pub owner: Result<String, String>,
        pub native_balance: Result<u128, String>,
        pub token_results: Vec<MulticallOutcome>,
    }

    impl Default for ScriptedChain {
        fn default() -> Self {
            Self {
                owner: Ok("0x0000000000000000000000000000000000000000".to_string()),
                native_balance: Ok(0),
                token_results: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ChainReader for ScriptedChain {
        async fn get_name_owner(&self, _token_id: &str) -> Result<String, EthereumClientError> {
            self.owner
                .clone()
                .map_err(EthereumClientError::NetworkError)
        }

        async fn get_native_balance(&self, _address: &str) -> Result<u128, EthereumClientError> {
            self.native_balance
                .clone()
                .map_err(EthereumClientError::NetworkError)
        }

        async fn batch_token_balances(
            &self,
            _token_address: &str,
            _holders: &[String],
        ) -> Result<Vec<MulticallOutcome>, EthereumClientError> {
            Ok(self.token_results.clone())
        }
    }
}
