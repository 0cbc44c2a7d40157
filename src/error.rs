use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum SceneError {
    #[error("unrecognised accent colour {0:?}")]
    InvalidAccent(String),
    #[error("{pool} pool holds a non-finite entity at slot {slot}")]
    NonFinite { pool: &'static str, slot: usize },
    #[error("{pool} pool reports {live} live entities but capacity is {capacity}")]
    PoolOverflow {
        pool: &'static str,
        live: usize,
        capacity: usize,
    },
    #[error("failed to present frame: {0}")]
    Present(#[from] std::io::Error),
}
