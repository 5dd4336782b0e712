//! Default factories describing the LiteX cores behind each subsystem kind.

use crate::compose::{DynError, FactoryRegistry, InstanceContext, PeripheralFactory, Subsystem};
use crate::config::{StorageMode, VideoMode};
use crate::select::{CoreSelection, EthernetRole, SubsystemKind};

const MIB: u32 = 1024 * 1024;

/// Size of the LiteEth MAC buffer region
const ETHMAC_REGION_SIZE: u32 = 0x2000;

pub fn sdram_module_size(module: &str) -> Option<u32> {
    match module {
        "M12L64322A" => Some(8 * MIB),
        _ => None,
    }
}

pub fn flash_module_size(module: &str) -> Option<u32> {
    match module {
        "GD25Q16" => Some(2 * MIB),
        "W25Q64" => Some(8 * MIB),
        _ => None,
    }
}

/// One factory for the whole catalogue, dispatching on the binding's core selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct LitexCores;

impl PeripheralFactory for LitexCores {
    fn instantiate(&self, context: &InstanceContext<'_>) -> Result<Subsystem, DynError> {
        let kind = context.binding.kind;
        let subsystem = match (&context.binding.core, kind) {
            (CoreSelection::Sdram { phy, module, memory_clock, l2_size }, SubsystemKind::MemoryController) => {
                let size = sdram_module_size(module).ok_or_else(|| format!("unknown SDRAM module {}", module))?;
                Subsystem::new(kind, &format!("{} + {}", phy.as_str(), module), context)
                    .csr("sdram")
                    .region("main_ram", size, true)
                    .param("memory_clock", memory_clock)
                    .param("l2_size", l2_size)
            }
            (CoreSelection::SpiFlash { module, opcode, mode }, SubsystemKind::FlashController) => {
                let size = flash_module_size(module).ok_or_else(|| format!("unknown flash module {}", module))?;
                Subsystem::new(kind, &format!("LiteSPI {}", module), context)
                    .csr("spiflash_core")
                    .csr("spiflash_phy")
                    .region("spiflash", size, true)
                    .param("module", module)
                    .param("opcode", opcode)
                    .param("mode", mode)
            }
            (CoreSelection::LedChaser, SubsystemKind::LedSequencer) => {
                Subsystem::new(kind, "LedChaser", context).csr("leds").param("leds", context.resources.len())
            }
            (CoreSelection::SpiMaster { data_width, spi_clk_freq }, SubsystemKind::SpiMaster) => {
                // SCK toggles at most once per system clock edge
                if *spi_clk_freq > context.sys_clk_freq / 2.0 {
                    return Err(format!(
                        "SPI clock {} Hz too fast for a {} Hz system clock",
                        spi_clk_freq, context.sys_clk_freq
                    )
                    .into());
                }
                Subsystem::new(kind, "SPIMaster + GPIOOut", context)
                    .csr("spi")
                    .csr("lora_reset")
                    .param("data_width", data_width)
                    .param("spi_clk_freq", spi_clk_freq)
            }
            (CoreSelection::I2cBitbang, SubsystemKind::I2cMaster) => {
                Subsystem::new(kind, "I2CMaster", context).csr("i2c")
            }
            (CoreSelection::Ethernet { role, settings }, SubsystemKind::EthernetPhy) => {
                let subsystem = Subsystem::new(kind, "LiteEthPHYRGMII", context)
                    .csr("ethphy")
                    .param("phy", settings.phy)
                    .param("local_ip", settings.local_ip)
                    .param("remote_ip", settings.remote_ip);
                match role {
                    EthernetRole::Mac => {
                        subsystem.csr("ethmac").region("ethmac", ETHMAC_REGION_SIZE, false).param("role", "mac")
                    }
                    EthernetRole::Etherbone => subsystem.param("role", "etherbone"),
                }
            }
            (CoreSelection::SdCard(StorageMode::SpiSdCard), SubsystemKind::SdCard) => {
                Subsystem::new(kind, "SPISDCard", context).csr("spisdcard")
            }
            (CoreSelection::SdCard(StorageMode::NativeSdCard), SubsystemKind::SdCard) => {
                let mut subsystem = Subsystem::new(kind, "SDCard", context);
                for csr in ["sdcard_block2mem", "sdcard_core", "sdcard_irq", "sdcard_mem2block", "sdcard_phy"] {
                    subsystem = subsystem.csr(csr);
                }
                subsystem
            }
            (CoreSelection::Video(VideoMode::Terminal), SubsystemKind::VideoPhy) => {
                Subsystem::new(kind, "VideoHDMIPHY + VideoTerminal", context)
            }
            (CoreSelection::Video(VideoMode::Framebuffer), SubsystemKind::VideoPhy) => {
                Subsystem::new(kind, "VideoHDMIPHY + VideoFramebuffer", context)
                    .csr("video_framebuffer")
                    .csr("video_framebuffer_vtg")
            }
            (CoreSelection::UsbAcm, SubsystemKind::UsbSerial) => {
                Subsystem::new(kind, "ValentyUSB CDC-ACM", context).csr("uart")
            }
            (core, kind) => return Err(format!("core {:?} cannot implement {:?}", core, kind).into()),
        };
        Ok(subsystem)
    }
}

/// A registry with [`LitexCores`] behind every kind.
pub fn default_factories() -> FactoryRegistry {
    let mut factories = FactoryRegistry::new();
    for kind in [
        SubsystemKind::MemoryController,
        SubsystemKind::FlashController,
        SubsystemKind::LedSequencer,
        SubsystemKind::SpiMaster,
        SubsystemKind::I2cMaster,
        SubsystemKind::EthernetPhy,
        SubsystemKind::SdCard,
        SubsystemKind::VideoPhy,
        SubsystemKind::UsbSerial,
    ] {
        factories.register(kind, LitexCores);
    }
    factories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocks::{FrequencyPlanResolver, ReferenceClock};
    use crate::config::{SocConfig, SocOptions};
    use crate::platform::{BoardResources, PinGroup};
    use crate::reset::ResetHandle;
    use crate::select::{select_config, PeripheralBinding, ResourceHandle};

    fn instantiate(binding: &PeripheralBinding, sys_clk_freq: f64) -> Result<Subsystem, DynError> {
        let config = SocConfig::from_options(&SocOptions::default()).unwrap();
        let domains = FrequencyPlanResolver::new(config.board.device(), ResetHandle::released())
            .resolve(ReferenceClock::external_pin(), 60e6, config.data_rate, false, false)
            .unwrap();
        let resources = [PinGroup::new("spi", 0)];
        LitexCores.instantiate(&InstanceContext { binding, domain: domains.sys(), resources: &resources, sys_clk_freq })
    }

    fn spi_binding(spi_clk_freq: f64) -> PeripheralBinding {
        PeripheralBinding {
            kind: SubsystemKind::SpiMaster,
            name: "spi",
            domain: "sys",
            reset: ResetHandle::released(),
            resource: ResourceHandle::one("spi", 0),
            core: CoreSelection::SpiMaster { data_width: 8, spi_clk_freq },
        }
    }

    #[test]
    fn catalogue_covers_every_kind() {
        let factories = default_factories();
        assert_eq!(factories.len(), 9);
        assert!(factories.contains(SubsystemKind::UsbSerial));
    }

    #[test]
    fn spi_master() {
        let spi = instantiate(&spi_binding(1e6), 60e6).unwrap();
        assert_eq!(spi.csrs, vec!["spi", "lora_reset"]);
        assert_eq!(spi.parameters["data_width"], "8");
        assert_eq!(spi.pins, vec!["spi:0"]);
        assert!(instantiate(&spi_binding(40e6), 60e6).is_err());
    }

    #[test]
    fn mismatched_core_is_refused() {
        let mut binding = spi_binding(1e6);
        binding.kind = SubsystemKind::I2cMaster;
        assert!(instantiate(&binding, 60e6).is_err());
    }

    #[test]
    fn module_sizes() {
        assert_eq!(flash_module_size("GD25Q16"), Some(2 * MIB));
        assert_eq!(flash_module_size("W25Q64"), Some(8 * MIB));
        assert_eq!(flash_module_size("W25Q128"), None);
        assert_eq!(sdram_module_size("M12L64322A"), Some(8 * MIB));
    }

    #[test]
    fn every_selected_core_instantiates() {
        let mut options = SocOptions::default();
        options.board = "i9".to_string();
        options.revision = "7.2".to_string();
        options.with_radio_spi = true;
        options.with_sensor_i2c = true;
        options.with_ethernet = true;
        options.with_spi_sdcard = true;
        options.with_video_terminal = true;
        options.uart_name = "usb_acm".to_string();
        let config = SocConfig::from_options(&options).unwrap();
        let domains = FrequencyPlanResolver::new(config.board.device(), ResetHandle::released())
            .resolve(ReferenceClock::external_pin(), 60e6, config.data_rate, true, true)
            .unwrap();
        let plan = select_config(&config, &domains, &BoardResources::for_config(&config).unwrap()).unwrap();
        for binding in plan.bindings() {
            let domain = domains.get(binding.domain).unwrap();
            let subsystem = LitexCores
                .instantiate(&InstanceContext { binding, domain, resources: &[], sys_clk_freq: 60e6 })
                .unwrap();
            assert_eq!(subsystem.kind, binding.kind);
            assert_eq!(subsystem.domain, binding.domain);
        }
    }
}
