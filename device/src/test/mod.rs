
use hexagon_dtype::Device;

use crate::{DeviceConfig, HexagonDeviceApi, Threading};

/// Route library events to the test harness; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const HEXAGON: Device = Device::hexagon(0);

/// Device API running dispatched work on the caller.
pub fn inline_api(lanes: usize, vtcm_capacity: usize) -> HexagonDeviceApi {
    init_tracing();
    let config = DeviceConfig::builder().lanes(lanes).vtcm_capacity(vtcm_capacity).threading(Threading::Inline).build();
    HexagonDeviceApi::new(config).unwrap()
}

/// Device API backed by real worker threads.
pub fn worker_api(lanes: usize) -> HexagonDeviceApi {
    init_tracing();
    let config = DeviceConfig::builder().lanes(lanes).queue_depth(64).build();
    HexagonDeviceApi::new(config).unwrap()
}
