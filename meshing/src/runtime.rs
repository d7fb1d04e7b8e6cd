use cv_core::{Error, Result};
use rayon::ThreadPoolBuilder;
use std::env;
use std::sync::OnceLock;

pub const THREADS_ENV: &str = "MESHING_CPU_THREADS";

static THREAD_POOL_INIT: OnceLock<std::result::Result<usize, String>> = OnceLock::new();

/// Initialize the global Rayon pool used for depth-map loading.
///
/// Priority:
/// 1. `num_threads` argument
/// 2. `MESHING_CPU_THREADS` environment variable
/// 3. Rayon default
///
/// Only the first call configures the pool; later calls return its outcome.
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<usize> {
    let res = THREAD_POOL_INIT.get_or_init(|| {
        let configured = match num_threads {
            Some(n) => Some(n),
            None => threads_from_env().map_err(|e| e.to_string())?,
        };

        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = configured {
            if n == 0 {
                return Err(format!("{} must be >= 1", THREADS_ENV));
            }
            builder = builder.num_threads(n);
        }
        builder
            .build_global()
            .map_err(|e| e.to_string())
            .map(|_| rayon::current_num_threads())
    });
    res.clone().map_err(Error::Configuration)
}

fn threads_from_env() -> Result<Option<usize>> {
    match env::var(THREADS_ENV) {
        Ok(raw) => parse_thread_count(&raw).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Configuration(format!(
            "failed to read {}: {}",
            THREADS_ENV, e
        ))),
    }
}

pub fn parse_thread_count(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Configuration(format!(
            "{} must be a positive integer, got '{}'",
            THREADS_ENV, raw
        ))),
    }
}
