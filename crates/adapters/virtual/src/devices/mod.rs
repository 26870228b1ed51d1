//! Simulated instruments.

mod cryostat;
mod daq;
mod oscilloscope;
mod photon_counter;
mod source_meter;
mod spectrometer;
mod switch_box;

pub use cryostat::VirtualCryostat;
pub use daq::VirtualDaq;
pub use oscilloscope::VirtualOscilloscope;
pub use photon_counter::VirtualPhotonCounter;
pub use source_meter::VirtualSourceMeter;
pub use spectrometer::VirtualSpectrometer;
pub use switch_box::VirtualSwitchBox;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rexlab_domain::error::HardwareFault;

/// Connection state shared by every simulated instrument.
#[derive(Debug)]
struct Handle {
    model: &'static str,
    unplugged: bool,
    open: bool,
}

impl Handle {
    fn new(model: &'static str) -> Self {
        Self {
            model,
            unplugged: false,
            open: false,
        }
    }

    fn open(&mut self) -> Result<bool, HardwareFault> {
        if self.unplugged {
            return Err(HardwareFault::NotFound);
        }
        self.open = true;
        tracing::debug!(model = self.model, "virtual instrument opened");
        Ok(true)
    }

    fn ensure_open(&self) -> Result<(), HardwareFault> {
        if self.open {
            Ok(())
        } else {
            Err(HardwareFault::Disconnected)
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            tracing::debug!(model = self.model, "virtual instrument closed");
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.open {
            tracing::debug!(model = self.model, "virtual instrument released on drop");
        }
    }
}

fn entropy() -> StdRng {
    StdRng::from_entropy()
}

fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
