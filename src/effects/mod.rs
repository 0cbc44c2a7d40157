pub(crate) mod boost;
pub(crate) mod turning;
pub(crate) mod weather;

pub(crate) use boost::{Boost, BoostState};
pub(crate) use turning::Turning;
pub(crate) use weather::{Lightning, WeatherState};
