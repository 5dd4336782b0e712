//! Frequency plan resolution: one reference clock in, a full clock/reset domain set out.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domains::*;
use crate::pll::{find_pll_config, OutputRequest, PllConfig, PllId};
use crate::reset::ResetHandle;
use crate::Error;

/// Board oscillator pin
pub const EXTERNAL_CLOCK_RESOURCE: &str = "clk25";
pub const EXTERNAL_CLOCK_HZ: f64 = 25e6;

/// Nominal OSCG frequency before its divider
const OSCG_BASE_HZ: f64 = 310e6;
const OSCG_DIV: u32 = 5;

pub const USB_12_HZ: f64 = 12e6;
pub const USB_48_HZ: f64 = 48e6;
pub const HDMI_HZ: f64 = 40e6;
pub const HDMI5X_HZ: f64 = 200e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferenceSource {
    ExternalPin,
    InternalOscillator,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceClock {
    pub source: ReferenceSource,
    pub frequency_hz: f64,
}

impl ReferenceClock {
    pub fn external_pin() -> ReferenceClock {
        ReferenceClock { source: ReferenceSource::ExternalPin, frequency_hz: EXTERNAL_CLOCK_HZ }
    }

    pub fn internal_oscillator() -> ReferenceClock {
        ReferenceClock {
            source: ReferenceSource::InternalOscillator,
            frequency_hz: OSCG_BASE_HZ / OSCG_DIV as f64,
        }
    }

    pub fn select(use_internal_osc: bool) -> ReferenceClock {
        if use_internal_osc {
            ReferenceClock::internal_oscillator()
        } else {
            ReferenceClock::external_pin()
        }
    }
}

/// SDRAM data rate relative to the system clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataRateMode {
    /// "1:1"
    FullRate,
    /// "1:2"
    HalfRate,
}

impl DataRateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataRateMode::FullRate => "1:1",
            DataRateMode::HalfRate => "1:2",
        }
    }
}

impl FromStr for DataRateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<DataRateMode, Error> {
        match s.trim() {
            "1:1" => Ok(DataRateMode::FullRate),
            "1:2" => Ok(DataRateMode::HalfRate),
            other => Err(Error::invalid("sdram_rate", other)),
        }
    }
}

impl fmt::Display for DataRateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str()) }
}

/// FPGA parts fitted to the supported boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Ecp5Device {
    Lfe5u25f,
    Lfe5u45f,
}

impl Ecp5Device {
    pub fn part(&self) -> &'static str {
        match self {
            Ecp5Device::Lfe5u25f => "LFE5U-25F-6BG381C",
            Ecp5Device::Lfe5u45f => "LFE5U-45F-6BG381C",
        }
    }

    pub fn pll_count(&self) -> usize {
        match self {
            Ecp5Device::Lfe5u25f => 2,
            Ecp5Device::Lfe5u45f => 4,
        }
    }
}

/// Hands out physical PLLs, at most one per domain group.
struct PllAllocator {
    device: Ecp5Device,
    allocated: Vec<PllId>,
}

impl PllAllocator {
    fn new(device: Ecp5Device) -> PllAllocator { PllAllocator { device, allocated: Vec::new() } }

    fn allocate(&mut self, id: PllId) -> Result<PllId, Error> {
        if self.allocated.contains(&id) {
            return Err(Error::UnsatisfiableFrequencyPlan(format!("{:?} PLL allocated twice", id)));
        }
        if self.allocated.len() >= self.device.pll_count() {
            return Err(Error::UnsatisfiableFrequencyPlan(format!(
                "{} has {} PLLs, {:?} needs another",
                self.device.part(),
                self.device.pll_count(),
                id
            )));
        }
        self.allocated.push(id);
        Ok(id)
    }
}

pub struct FrequencyPlanResolver {
    device: Ecp5Device,
    reset: ResetHandle,
}

impl FrequencyPlanResolver {
    /// `reset` is the fanned-in reset condition given to every PLL.
    pub fn new(device: Ecp5Device, reset: ResetHandle) -> FrequencyPlanResolver {
        FrequencyPlanResolver { device, reset }
    }

    pub fn resolve(
        &self,
        reference: ReferenceClock,
        requested_sys_hz: f64,
        data_rate: DataRateMode,
        want_usb_domain: bool,
        want_video_domain: bool,
    ) -> Result<ClockDomainSet, Error> {
        if !(requested_sys_hz.is_finite() && requested_sys_hz > 0.0) {
            return Err(Error::invalid("sys_clk_freq", requested_sys_hz));
        }
        let mut allocator = PllAllocator::new(self.device);
        let mut plls = Vec::new();

        let primary = allocator.allocate(PllId::Primary)?;
        let mut requests = vec![OutputRequest::new(SYS, requested_sys_hz)];
        match data_rate {
            DataRateMode::HalfRate => {
                requests.push(OutputRequest::new(SYS2X, 2.0 * requested_sys_hz));
                requests.push(OutputRequest::new(SYS2X_PS, 2.0 * requested_sys_hz).phase(180.0));
            }
            DataRateMode::FullRate => {
                requests.push(OutputRequest::new(SYS_PS, requested_sys_hz).phase(180.0));
            }
        }
        let config = find_pll_config(primary, reference.frequency_hz, &requests)?;
        let sys = self.domain(&config, SYS);
        let data_rate_domains = match data_rate {
            DataRateMode::HalfRate => DataRateDomains::HalfRate {
                sys2x: self.domain(&config, SYS2X),
                sys2x_ps: self.domain(&config, SYS2X_PS),
            },
            DataRateMode::FullRate => DataRateDomains::FullRate { sys_ps: self.domain(&config, SYS_PS) },
        };
        plls.push(config);

        let usb = if want_usb_domain {
            let id = allocator.allocate(PllId::Usb)?;
            let config = find_pll_config(id, reference.frequency_hz, &[
                OutputRequest::new(USB_12, USB_12_HZ).exact(),
                OutputRequest::new(USB_48, USB_48_HZ).exact(),
            ])?;
            let domains = UsbDomains { usb_12: self.domain(&config, USB_12), usb_48: self.domain(&config, USB_48) };
            plls.push(config);
            Some(domains)
        } else {
            None
        };

        let video = if want_video_domain {
            let id = allocator.allocate(PllId::Video)?;
            let config = find_pll_config(id, reference.frequency_hz, &[
                OutputRequest::new(HDMI, HDMI_HZ).exact(),
                OutputRequest::new(HDMI5X, HDMI5X_HZ).exact(),
            ])?;
            let domains = VideoDomains { hdmi: self.domain(&config, HDMI), hdmi5x: self.domain(&config, HDMI5X) };
            plls.push(config);
            Some(domains)
        } else {
            None
        };

        let set = ClockDomainSet::new(reference, self.reset, sys, data_rate_domains, usb, video, plls);
        log::info!(
            "resolved {} clock domains on {} PLLs: {}",
            set.names().len(),
            set.plls().len(),
            set.names().join(", ")
        );
        Ok(set)
    }

    fn domain(&self, config: &PllConfig, name: &'static str) -> ClockDomain {
        // Every request handed to the search yields exactly one output of the same name.
        let (frequency_hz, phase_degrees) =
            config.output(name).map(|o| (o.frequency_hz, o.phase_degrees)).unwrap_or_default();
        ClockDomain { name, frequency_hz, phase_degrees, reset: self.reset, pll: config.id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(device: Ecp5Device) -> FrequencyPlanResolver {
        FrequencyPlanResolver::new(device, ResetHandle::released())
    }

    fn resolve(mode: DataRateMode, usb: bool, video: bool) -> ClockDomainSet {
        resolver(Ecp5Device::Lfe5u45f).resolve(ReferenceClock::external_pin(), 60e6, mode, usb, video).unwrap()
    }

    #[test]
    fn full_rate_shape() {
        let set = resolve(DataRateMode::FullRate, false, false);
        assert_eq!(set.names(), vec![SYS, SYS_PS]);
        assert!(!set.contains(SYS2X));
        assert!(!set.contains(SYS2X_PS));
        assert_eq!(set.memory_clock().name, SYS_PS);
        assert_eq!(set.sys().frequency_hz, 60e6);
        assert_eq!(set.get(SYS_PS).unwrap().frequency_hz, 60e6);
    }

    #[test]
    fn half_rate_shape() {
        let set = resolve(DataRateMode::HalfRate, false, false);
        assert_eq!(set.names(), vec![SYS, SYS2X, SYS2X_PS]);
        assert!(!set.contains(SYS_PS));
        assert_eq!(set.memory_clock().name, SYS2X_PS);
        assert_eq!(set.get(SYS2X).unwrap().frequency_hz, 120e6);
        assert_eq!(set.get(SYS2X_PS).unwrap().frequency_hz, 120e6);
        assert_eq!(set.data_rate().mode(), DataRateMode::HalfRate);
    }

    #[test]
    fn phases() {
        for mode in [DataRateMode::FullRate, DataRateMode::HalfRate] {
            let set = resolve(mode, true, true);
            for domain in set.iter() {
                if domain.name.ends_with("_ps") {
                    assert_eq!(domain.phase_degrees, 180.0, "{}", domain.name);
                } else {
                    assert_eq!(domain.phase_degrees, 0.0, "{}", domain.name);
                }
            }
        }
    }

    #[test]
    fn optional_pairs_are_exact() {
        for sys_hz in [48e6, 60e6, 75e6] {
            let set = resolver(Ecp5Device::Lfe5u45f)
                .resolve(ReferenceClock::external_pin(), sys_hz, DataRateMode::FullRate, true, true)
                .unwrap();
            let usb = set.usb().unwrap();
            assert_eq!(usb.usb_12.frequency_hz, 12e6);
            assert_eq!(usb.usb_48.frequency_hz, 48e6);
            let video = set.video().unwrap();
            assert_eq!(video.hdmi.frequency_hz, 40e6);
            assert_eq!(video.hdmi5x.frequency_hz, 200e6);
            assert_eq!(video.hdmi5x.frequency_hz, 5.0 * video.hdmi.frequency_hz);
        }
    }

    #[test]
    fn each_group_gets_its_own_pll() {
        let set = resolve(DataRateMode::FullRate, true, true);
        let ids: Vec<PllId> = set.plls().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PllId::Primary, PllId::Usb, PllId::Video]);
        assert_eq!(set.get(USB_48).unwrap().pll, PllId::Usb);
        assert_eq!(set.get(HDMI).unwrap().pll, PllId::Video);
        assert!(set.iter().all(|d| d.reset == set.reset()));
    }

    #[test]
    fn small_device_runs_out_of_plls() {
        let result = resolver(Ecp5Device::Lfe5u25f).resolve(
            ReferenceClock::external_pin(),
            60e6,
            DataRateMode::FullRate,
            true,
            true,
        );
        assert!(matches!(result, Err(Error::UnsatisfiableFrequencyPlan(_))));
        // two groups still fit
        assert!(resolver(Ecp5Device::Lfe5u25f)
            .resolve(ReferenceClock::external_pin(), 60e6, DataRateMode::FullRate, false, true)
            .is_ok());
    }

    #[test]
    fn usb_from_internal_oscillator_is_rejected() {
        let osc = ReferenceClock::internal_oscillator();
        assert_eq!(osc.frequency_hz, 62e6);
        let result = resolver(Ecp5Device::Lfe5u45f).resolve(osc, 60e6, DataRateMode::FullRate, true, false);
        assert!(matches!(result, Err(Error::UnsatisfiableFrequencyPlan(_))));
    }

    #[test]
    fn data_rate_strings() {
        assert_eq!("1:1".parse::<DataRateMode>().unwrap(), DataRateMode::FullRate);
        assert_eq!("1:2".parse::<DataRateMode>().unwrap(), DataRateMode::HalfRate);
        assert!(matches!("2:1".parse::<DataRateMode>(), Err(Error::InvalidOption { .. })));
    }
}
