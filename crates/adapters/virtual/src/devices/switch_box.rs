//! Virtual mixed-signal switch box.

use std::collections::BTreeMap;

use rexlab_app::ports::hardware::{ChannelState, SwitchChannel, SwitchLayout};
use rexlab_app::ports::{BusyProbe, Hardware, SwitchBoxHardware};
use rexlab_domain::error::HardwareFault;

use super::Handle;

const MAX_CODE: u8 = 0xF;

/// A simulated four-channel switch box. All channels power on at code 0, not inverted.
#[derive(Debug)]
pub struct VirtualSwitchBox {
    handle: Handle,
    channels: BTreeMap<SwitchChannel, ChannelState>,
}

impl Default for VirtualSwitchBox {
    fn default() -> Self {
        Self {
            handle: Handle::new("VSW-4"),
            channels: SwitchChannel::ALL
                .into_iter()
                .map(|channel| (channel, ChannelState::default()))
                .collect(),
        }
    }
}

impl VirtualSwitchBox {
    /// A box that is not connected; `open` fails.
    #[must_use]
    pub fn unplugged() -> Self {
        let mut switch = Self::default();
        switch.handle.unplugged = true;
        switch
    }

    fn channel(&mut self, channel: SwitchChannel) -> &mut ChannelState {
        self.channels.entry(channel).or_default()
    }
}

impl BusyProbe for VirtualSwitchBox {
    async fn is_busy(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(false)
    }
}

impl Hardware for VirtualSwitchBox {
    type Settings = SwitchLayout;
    type Reading = BTreeMap<SwitchChannel, ChannelState>;

    async fn open(&mut self) -> Result<bool, HardwareFault> {
        self.handle.open()
    }

    async fn reset(&mut self) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        for state in self.channels.values_mut() {
            *state = ChannelState::default();
        }
        Ok(true)
    }

    async fn configure(&mut self, layout: &SwitchLayout) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if layout.matrix.values().any(|code| *code > MAX_CODE) {
            return Ok(false);
        }
        for (channel, code) in &layout.matrix {
            self.channel(*channel).matrix = *code;
        }
        for (channel, inverted) in &layout.polarity {
            self.channel(*channel).inverted = *inverted;
        }
        Ok(true)
    }

    async fn read(&mut self) -> Result<BTreeMap<SwitchChannel, ChannelState>, HardwareFault> {
        self.handle.ensure_open()?;
        Ok(self.channels.clone())
    }

    async fn close(&mut self) -> Result<(), HardwareFault> {
        self.handle.close();
        Ok(())
    }
}

impl SwitchBoxHardware for VirtualSwitchBox {
    async fn set_matrix(&mut self, channel: SwitchChannel, code: u8) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        if code > MAX_CODE {
            return Ok(false);
        }
        self.channel(channel).matrix = code;
        Ok(true)
    }

    async fn set_polarity(
        &mut self,
        channel: SwitchChannel,
        inverted: bool,
    ) -> Result<bool, HardwareFault> {
        self.handle.ensure_open()?;
        self.channel(channel).inverted = inverted;
        Ok(true)
    }
}
