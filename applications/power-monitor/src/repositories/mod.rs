pub mod alerts;
pub mod devices;
pub mod telemetry;

pub use alerts::PgAlertRepository;
pub use devices::PgDeviceRepository;
pub use telemetry::PgTelemetryRepository;
