use log::info;

/// Worker threads used when nothing is specified
pub const DEFAULT_WORKER_THREADS: usize = 4;

pub fn determine_thread_counts_1(total: Option<usize>) -> anyhow::Result<usize> {
    match total {
        Some(0) => anyhow::bail!("Cannot set number of threads to zero"),
        Some(total) => anyhow::Ok(total),
        None => {
            info!(
                "Number of threads not specified, using {}",
                DEFAULT_WORKER_THREADS
            );
            anyhow::Ok(DEFAULT_WORKER_THREADS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_counts() {
        assert_eq!(determine_thread_counts_1(None).unwrap(), DEFAULT_WORKER_THREADS);
        assert_eq!(determine_thread_counts_1(Some(9)).unwrap(), 9);
        assert!(determine_thread_counts_1(Some(0)).is_err());
    }
}
