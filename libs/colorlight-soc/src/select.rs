//! Feature selection: which subsystems exist, in what order, bound to which domain.

use serde::Serialize;

use crate::config::{BoardVariant, NetworkMode, NetworkSettings, SerialTransport, SocConfig, SocOptions, StorageMode, VideoMode};
use crate::domains::{ClockDomainSet, HDMI, SYS, SYS2X, SYS_PS, USB_12};
use crate::clocks::DataRateMode;
use crate::platform::ResourceProvider;
use crate::reset::ResetHandle;
use crate::Error;

/// Subsystem catalogue, in binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SubsystemKind {
    MemoryController,
    FlashController,
    LedSequencer,
    SpiMaster,
    I2cMaster,
    EthernetPhy,
    SdCard,
    VideoPhy,
    UsbSerial,
}

pub const SDRAM_MODULE: &str = "M12L64322A";
pub const RADIO_SPI_CLK_HZ: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SdramPhy {
    Gensdr,
    HalfRateGensdr,
}

impl SdramPhy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdramPhy::Gensdr => "GENSDRPHY",
            SdramPhy::HalfRateGensdr => "HalfRateGENSDRPHY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EthernetRole {
    /// MAC for the CPU
    Mac,
    /// Wishbone bridge over UDP
    Etherbone,
}

/// Per-kind core parameters carried from selection to the factory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CoreSelection {
    Sdram { phy: SdramPhy, module: &'static str, memory_clock: &'static str, l2_size: u32 },
    SpiFlash { module: &'static str, opcode: &'static str, mode: &'static str },
    LedChaser,
    SpiMaster { data_width: u32, spi_clk_freq: f64 },
    I2cBitbang,
    Ethernet { role: EthernetRole, settings: NetworkSettings },
    SdCard(StorageMode),
    Video(VideoMode),
    UsbAcm,
}

/// One pin-group request. `number: None` asks for every resource with that name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRequest {
    pub name: &'static str,
    pub number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ResourceHandle {
    pub requests: Vec<ResourceRequest>,
}

impl ResourceHandle {
    pub fn one(name: &'static str, number: u32) -> ResourceHandle {
        ResourceHandle::default().and(name, number)
    }

    pub fn all(name: &'static str) -> ResourceHandle {
        ResourceHandle { requests: vec![ResourceRequest { name, number: None }] }
    }

    pub fn and(mut self, name: &'static str, number: u32) -> ResourceHandle {
        self.requests.push(ResourceRequest { name, number: Some(number) });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeripheralBinding {
    pub kind: SubsystemKind,
    pub name: &'static str,
    /// Name of a domain in the plan's domain set
    pub domain: &'static str,
    pub reset: ResetHandle,
    pub resource: ResourceHandle,
    pub core: CoreSelection,
}

/// Validated, ordered bindings plus the domains they refer to. Not modified after selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPlan {
    config: SocConfig,
    domains: ClockDomainSet,
    bindings: Vec<PeripheralBinding>,
}

impl BuildPlan {
    pub fn config(&self) -> &SocConfig { &self.config }

    pub fn domains(&self) -> &ClockDomainSet { &self.domains }

    pub fn bindings(&self) -> &[PeripheralBinding] { &self.bindings }

    pub fn kinds(&self) -> Vec<SubsystemKind> { self.bindings.iter().map(|b| b.kind).collect() }

    pub fn binding(&self, kind: SubsystemKind) -> Option<&PeripheralBinding> {
        self.bindings.iter().find(|b| b.kind == kind)
    }
}

pub fn flash_module(board: BoardVariant) -> &'static str {
    match board {
        BoardVariant::I5 => "GD25Q16",
        BoardVariant::I9 => "W25Q64",
    }
}

/// Validate raw options and select the subsystems for them.
pub fn select<P>(options: &SocOptions, domains: &ClockDomainSet, provider: &P) -> Result<BuildPlan, Error>
where
    P: ResourceProvider + ?Sized,
{
    let config = SocConfig::from_options(options)?;
    select_config(&config, domains, provider)
}

/// Select the subsystems for an already validated configuration.
pub fn select_config<P>(config: &SocConfig, domains: &ClockDomainSet, provider: &P) -> Result<BuildPlan, Error>
where
    P: ResourceProvider + ?Sized,
{
    check_domains(config, domains)?;

    let reset = domains.reset();
    let binding = |kind, name, domain, resource, core| PeripheralBinding { kind, name, domain, reset, resource, core };
    let mut bindings = Vec::new();

    let integrated = provider.integrated_main_ram_size();
    if integrated == 0 {
        let phy = match config.data_rate {
            DataRateMode::FullRate => SdramPhy::Gensdr,
            DataRateMode::HalfRate => SdramPhy::HalfRateGensdr,
        };
        bindings.push(binding(
            SubsystemKind::MemoryController,
            "sdram",
            SYS,
            ResourceHandle::one("sdram", 0).and(crate::domains::MEMORY_CLOCK_RESOURCE, 0),
            CoreSelection::Sdram {
                phy,
                module: SDRAM_MODULE,
                memory_clock: domains.memory_clock().name,
                l2_size: config.l2_size,
            },
        ));
    } else {
        log::info!("main RAM already integrated ({} bytes), skipping SDRAM controller", integrated);
    }

    bindings.push(binding(
        SubsystemKind::FlashController,
        "spiflash",
        SYS,
        ResourceHandle::one("spiflash", 0),
        CoreSelection::SpiFlash { module: flash_module(config.board), opcode: "READ_1_1_1", mode: "1x" },
    ));

    if config.with_led_chaser {
        bindings.push(binding(
            SubsystemKind::LedSequencer,
            "leds",
            SYS,
            ResourceHandle::all("user_led_n"),
            CoreSelection::LedChaser,
        ));
    }

    if config.with_radio_spi {
        bindings.push(binding(
            SubsystemKind::SpiMaster,
            "spi",
            SYS,
            ResourceHandle::one("spi", 0).and("lora_reset", 0),
            CoreSelection::SpiMaster { data_width: 8, spi_clk_freq: RADIO_SPI_CLK_HZ },
        ));
    }

    if config.with_sensor_i2c {
        bindings.push(binding(
            SubsystemKind::I2cMaster,
            "i2c",
            SYS,
            ResourceHandle::one("i2c", 0),
            CoreSelection::I2cBitbang,
        ));
    }

    match config.network {
        NetworkMode::None => (),
        NetworkMode::Ethernet(settings) | NetworkMode::Etherbone(settings) => {
            let role = match config.network {
                NetworkMode::Etherbone(_) => EthernetRole::Etherbone,
                _ => EthernetRole::Mac,
            };
            bindings.push(binding(
                SubsystemKind::EthernetPhy,
                "ethphy",
                SYS,
                ResourceHandle::one("eth_clocks", settings.phy).and("eth", settings.phy),
                CoreSelection::Ethernet { role, settings },
            ));
        }
    }

    match config.storage {
        StorageMode::None => (),
        StorageMode::SpiSdCard => bindings.push(binding(
            SubsystemKind::SdCard,
            "spisdcard",
            SYS,
            ResourceHandle::one("spisdcard", 0),
            CoreSelection::SdCard(StorageMode::SpiSdCard),
        )),
        StorageMode::NativeSdCard => bindings.push(binding(
            SubsystemKind::SdCard,
            "sdcard",
            SYS,
            ResourceHandle::one("sdcard", 0),
            CoreSelection::SdCard(StorageMode::NativeSdCard),
        )),
    }

    if config.video != VideoMode::None {
        bindings.push(binding(
            SubsystemKind::VideoPhy,
            "videophy",
            HDMI,
            ResourceHandle::one("gpdi", 0),
            CoreSelection::Video(config.video),
        ));
    }

    if config.serial == SerialTransport::UsbAcm {
        bindings.push(binding(SubsystemKind::UsbSerial, "uart", USB_12, ResourceHandle::one("usb", 0), CoreSelection::UsbAcm));
    }

    bindings.sort_by_key(|b| b.kind);
    log::info!(
        "selected {} subsystems: {}",
        bindings.len(),
        bindings.iter().map(|b| b.name).collect::<Vec<_>>().join(", ")
    );
    Ok(BuildPlan { config: config.clone(), domains: domains.clone(), bindings })
}

/// Every domain a selected subsystem will bind to must have been resolved.
fn check_domains(config: &SocConfig, domains: &ClockDomainSet) -> Result<(), Error> {
    let missing = |required_by: &str, domain| Error::MissingPrerequisiteDomain { required_by: required_by.to_string(), domain };
    if config.data_rate != domains.data_rate().mode() {
        let domain = match config.data_rate {
            DataRateMode::FullRate => SYS_PS,
            DataRateMode::HalfRate => SYS2X,
        };
        return Err(missing("SDRAM data rate", domain));
    }
    if config.video != VideoMode::None && domains.video().is_none() {
        return Err(missing("video PHY", HDMI));
    }
    if config.serial == SerialTransport::UsbAcm && domains.usb().is_none() {
        return Err(missing("USB ACM serial", USB_12));
    }
    Ok(())
}
