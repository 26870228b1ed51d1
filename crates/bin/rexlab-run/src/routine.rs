//! Demo measurement routine on virtual hardware.
//!
//! Every `device.<name>` section carrying a `kind` key is instantiated with
//! the matching virtual instrument, set up, measured a fixed number of times
//! and closed. Sections without `kind` are skipped.

use std::collections::BTreeMap;

use rexlab_adapter_virtual::{
    VirtualCryostat, VirtualDaq, VirtualOscilloscope, VirtualPhotonCounter, VirtualSourceMeter,
    VirtualSpectrometer, VirtualSwitchBox,
};
use rexlab_adapter_wire_tcp::TcpConnector;
use rexlab_app::devices::{
    Cryostat, Daq, Device, Oscilloscope, PhotonCounter, SourceMeter, Spectrometer, SwitchBox,
    with_device,
};
use rexlab_app::ports::{SpectrometerHardware, WireLink};
use rexlab_app::services::config_binder::load_document;
use rexlab_app::services::orchestrator::RunContext;
use rexlab_domain::error::LabError;
use rexlab_domain::record::MeasurementRecord;
use serde::Deserialize;

/// Instrument family named by a section's `kind` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Daq,
    Spectrometer,
    Cryostat,
    PhotonCounter,
    Oscilloscope,
    SwitchBox,
    SourceMeter,
}

/// Drive every configured device in document order.
///
/// # Errors
///
/// Stops at the first device that fails; devices already driven are closed.
pub async fn run(
    context: RunContext,
    measurements: u32,
) -> Result<BTreeMap<String, MeasurementRecord>, LabError> {
    let document = load_document(&context.config_path).await?;
    let mut records = BTreeMap::new();
    for name in document.device_names() {
        let Some(kind) = document.bind(name).get_as::<DeviceKind>("kind")? else {
            tracing::warn!(device = name, "no `kind` key, device skipped");
            continue;
        };
        tracing::info!(device = name, ?kind, "driving device");
        let record = drive(&context, name, kind, measurements).await?;
        records.insert(name.to_string(), record);
    }
    Ok(records)
}

async fn drive(
    context: &RunContext,
    name: &str,
    kind: DeviceKind,
    measurements: u32,
) -> Result<MeasurementRecord, LabError> {
    let path = context.config_path.as_path();
    let wire = &context.wire;
    match kind {
        DeviceKind::Daq => {
            let hardware = VirtualDaq::default();
            let mut daq = Daq::construct(path, name, hardware, &TcpConnector, wire).await?;
            sample(&mut daq, measurements).await
        }
        DeviceKind::Spectrometer => {
            let hardware = VirtualSpectrometer::default();
            let mut mono =
                Spectrometer::construct(path, name, hardware, &TcpConnector, wire).await?;
            scan(&mut mono, measurements).await
        }
        DeviceKind::Cryostat => {
            let hardware = VirtualCryostat::default();
            let mut cryostat =
                Cryostat::construct(path, name, hardware, &TcpConnector, wire).await?;
            sample(&mut cryostat, measurements).await
        }
        DeviceKind::PhotonCounter => {
            let hardware = VirtualPhotonCounter::default();
            let mut counter =
                PhotonCounter::construct(path, name, hardware, &TcpConnector, wire).await?;
            sample(&mut counter, measurements).await
        }
        DeviceKind::Oscilloscope => {
            let hardware = VirtualOscilloscope::default();
            let mut scope =
                Oscilloscope::construct(path, name, hardware, &TcpConnector, wire).await?;
            sample(&mut scope, measurements).await
        }
        DeviceKind::SwitchBox => {
            let hardware = VirtualSwitchBox::default();
            let mut switch =
                SwitchBox::construct(path, name, hardware, &TcpConnector, wire).await?;
            sample(&mut switch, measurements).await
        }
        DeviceKind::SourceMeter => {
            let hardware = VirtualSourceMeter::default();
            let mut smu =
                SourceMeter::construct(path, name, hardware, &TcpConnector, wire).await?;
            sample(&mut smu, measurements).await
        }
    }
}

/// Set up, measure `measurements` times, close. Returns the last record.
async fn sample<D: Device>(
    device: &mut D,
    measurements: u32,
) -> Result<MeasurementRecord, LabError> {
    with_device(device, async |device: &mut D| {
        device.setup_config().await?;
        let mut last = MeasurementRecord::new();
        for _ in 0..measurements {
            last = device.measure().await?;
        }
        Ok(last)
    })
    .await
}

/// Like [`sample`], stepping the mono between measurements.
async fn scan<H, L>(
    mono: &mut Spectrometer<H, L>,
    measurements: u32,
) -> Result<MeasurementRecord, LabError>
where
    H: SpectrometerHardware,
    L: WireLink,
{
    with_device(mono, async |mono: &mut Spectrometer<H, L>| {
        mono.setup_config().await?;
        let mut last = mono.measure().await?;
        for _ in 1..measurements {
            mono.step().await?;
            last = mono.measure().await?;
        }
        Ok(last)
    })
    .await
}
