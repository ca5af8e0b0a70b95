use std::time::Duration;

use crate::options::Options;
use crate::storage::Dir;

/// Settings shared read-only by every archive transfer.
#[derive(Clone, Debug)]
pub struct Config {
    pub dir: Dir,
    pub chunk_size: usize,
    pub throttling_delay: Option<Duration>,
    pub keep_broken_download: bool,
}

impl From<&Options> for Config {
    fn from(options: &Options) -> Self {
        Self {
            dir: Dir::new(&options.photo_path),
            chunk_size: options.chunk_size,
            throttling_delay: options.throttling_delay(),
            keep_broken_download: options.keep_broken_download,
        }
    }
}
