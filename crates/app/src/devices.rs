//! Device variants — one per instrument family.
//!
//! Every variant owns a [`DeviceCore`](crate::services::device_core::DeviceCore)
//! plus its family's hardware handle, and exposes the uniform [`Device`]
//! lifecycle. Variants are generic over the hardware port `H` and the wire
//! link `L`, so the same code drives real drivers, virtual instruments and
//! test fakes.

pub mod cryostat;
pub mod daq;
pub mod oscilloscope;
pub mod photon_counter;
pub mod source_meter;
pub mod spectrometer;
pub mod switch_box;

use std::future::Future;

use rexlab_domain::config::BoundConfig;
use rexlab_domain::error::LabError;
use rexlab_domain::lifecycle::LifecycleState;
use rexlab_domain::record::MeasurementRecord;

pub use cryostat::Cryostat;
pub use daq::Daq;
pub use oscilloscope::Oscilloscope;
pub use photon_counter::PhotonCounter;
pub use source_meter::SourceMeter;
pub use spectrometer::Spectrometer;
pub use switch_box::SwitchBox;

/// Uniform lifecycle shared by every instrument.
pub trait Device: Send {
    fn name(&self) -> &str;

    fn state(&self) -> LifecycleState;

    /// The device's bound configuration.
    fn config(&self) -> &BoundConfig;

    /// Readings of the last successful measurement.
    fn record(&self) -> &MeasurementRecord;

    /// Read the bound config and apply it to the hardware. Re-runnable;
    /// the only way out of the `Uncertain` state.
    fn setup_config(&mut self) -> impl Future<Output = Result<(), LabError>> + Send;

    /// One logical acquisition. Overwrites the record, publishes a payload
    /// and returns a snapshot of the record.
    fn measure(&mut self) -> impl Future<Output = Result<MeasurementRecord, LabError>> + Send;

    /// Release hardware and telemetry. Idempotent.
    fn close(&mut self) -> impl Future<Output = Result<(), LabError>> + Send;
}

/// Run `body` against `device`, then close the device whatever happened.
///
/// # Errors
///
/// Returns the body's error. If the body succeeded but closing failed, the
/// close error is returned; if both failed, the close error is only logged.
pub async fn with_device<D, T, F>(device: &mut D, body: F) -> Result<T, LabError>
where
    D: Device,
    F: AsyncFnOnce(&mut D) -> Result<T, LabError>,
{
    let outcome = body(&mut *device).await;
    let closed = device.close().await;
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::warn!(device = %device.name(), error = %close_err, "close failed after error");
            Err(err)
        }
    }
}
