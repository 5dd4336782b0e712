use serde::Serialize;

use crate::clocks::{DataRateMode, ReferenceClock};
use crate::pll::{PllConfig, PllId};
use crate::reset::ResetHandle;

pub const SYS: &str = "sys";
pub const SYS_PS: &str = "sys_ps";
pub const SYS2X: &str = "sys2x";
pub const SYS2X_PS: &str = "sys2x_ps";
pub const USB_12: &str = "usb_12";
pub const USB_48: &str = "usb_48";
pub const HDMI: &str = "hdmi";
pub const HDMI5X: &str = "hdmi5x";

/// Board resource driven by the memory clock output.
pub const MEMORY_CLOCK_RESOURCE: &str = "sdram_clock";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockDomain {
    pub name: &'static str,
    pub frequency_hz: f64,
    pub phase_degrees: f64,
    pub reset: ResetHandle,
    pub pll: PllId,
}

/// The domains that exist only in one data-rate mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataRateDomains {
    FullRate { sys_ps: ClockDomain },
    HalfRate { sys2x: ClockDomain, sys2x_ps: ClockDomain },
}

impl DataRateDomains {
    pub fn mode(&self) -> DataRateMode {
        match self {
            DataRateDomains::FullRate { .. } => DataRateMode::FullRate,
            DataRateDomains::HalfRate { .. } => DataRateMode::HalfRate,
        }
    }

    /// The phase-shifted clock routed to the memory clock pin.
    pub fn memory_clock(&self) -> &ClockDomain {
        match self {
            DataRateDomains::FullRate { sys_ps } => sys_ps,
            DataRateDomains::HalfRate { sys2x_ps, .. } => sys2x_ps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsbDomains {
    pub usb_12: ClockDomain,
    pub usb_48: ClockDomain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoDomains {
    pub hdmi: ClockDomain,
    pub hdmi5x: ClockDomain,
}

/// Every clock/reset domain of one build, together with the PLLs generating them.
///
/// Domain names are unique by construction: each name belongs to exactly one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockDomainSet {
    reference: ReferenceClock,
    reset: ResetHandle,
    sys: ClockDomain,
    data_rate: DataRateDomains,
    usb: Option<UsbDomains>,
    video: Option<VideoDomains>,
    plls: Vec<PllConfig>,
}

impl ClockDomainSet {
    pub(crate) fn new(
        reference: ReferenceClock,
        reset: ResetHandle,
        sys: ClockDomain,
        data_rate: DataRateDomains,
        usb: Option<UsbDomains>,
        video: Option<VideoDomains>,
        plls: Vec<PllConfig>,
    ) -> ClockDomainSet {
        ClockDomainSet { reference, reset, sys, data_rate, usb, video, plls }
    }

    pub fn reference(&self) -> &ReferenceClock { &self.reference }

    pub fn reset(&self) -> ResetHandle { self.reset }

    pub fn sys(&self) -> &ClockDomain { &self.sys }

    pub fn data_rate(&self) -> &DataRateDomains { &self.data_rate }

    pub fn usb(&self) -> Option<&UsbDomains> { self.usb.as_ref() }

    pub fn video(&self) -> Option<&VideoDomains> { self.video.as_ref() }

    pub fn plls(&self) -> &[PllConfig] { &self.plls }

    pub fn memory_clock(&self) -> &ClockDomain { self.data_rate.memory_clock() }

    /// All domains, primary PLL first, then USB, then video.
    pub fn iter(&self) -> impl Iterator<Item = &ClockDomain> {
        let data_rate: Vec<&ClockDomain> = match &self.data_rate {
            DataRateDomains::FullRate { sys_ps } => vec![sys_ps],
            DataRateDomains::HalfRate { sys2x, sys2x_ps } => vec![sys2x, sys2x_ps],
        };
        let usb = self.usb.iter().flat_map(|u| [&u.usb_12, &u.usb_48]);
        let video = self.video.iter().flat_map(|v| [&v.hdmi, &v.hdmi5x]);
        std::iter::once(&self.sys).chain(data_rate).chain(usb).chain(video)
    }

    pub fn get(&self, name: &str) -> Option<&ClockDomain> { self.iter().find(|d| d.name == name) }

    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }

    pub fn names(&self) -> Vec<&'static str> { self.iter().map(|d| d.name).collect() }
}
