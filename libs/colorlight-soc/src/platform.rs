//! Named board resources.
//!
//! The board catalogue lists every resource by name and subsignal. Pin locations of
//! the base board belong to the board description handed to the toolchain and are
//! left empty here; pins are recorded only for the extensions this SoC adds.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::{BoardVariant, SocConfig};
use crate::Error;

const LVCMOS33: &str = "LVCMOS33";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subsignal {
    pub name: String,
    pub pins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinGroup {
    pub name: String,
    pub number: u32,
    /// Pins of a single-signal resource
    pub pins: Vec<String>,
    pub subsignals: Vec<Subsignal>,
    pub io_standard: Option<String>,
}

impl PinGroup {
    pub fn new(name: &str, number: u32) -> PinGroup {
        PinGroup { name: name.to_string(), number, pins: Vec::new(), subsignals: Vec::new(), io_standard: None }
    }

    pub fn pins(mut self, pins: &str) -> PinGroup {
        self.pins = pins.split_whitespace().map(str::to_string).collect();
        self
    }

    pub fn subsignal(mut self, name: &str, pins: &str) -> PinGroup {
        self.subsignals.push(Subsignal {
            name: name.to_string(),
            pins: pins.split_whitespace().map(str::to_string).collect(),
        });
        self
    }

    /// Subsignals whose pins come from the board description
    pub fn signals(mut self, names: &[&str]) -> PinGroup {
        for name in names {
            self = self.subsignal(name, "");
        }
        self
    }

    pub fn io_standard(mut self, standard: &str) -> PinGroup {
        self.io_standard = Some(standard.to_string());
        self
    }

    /// `name:number`, the form used in logs and registration tables
    pub fn label(&self) -> String { format!("{}:{}", self.name, self.number) }
}

/// Source of board pins and of facts about the platform that the build can't compute.
pub trait ResourceProvider {
    /// Hand out one resource. A resource can be requested only once.
    fn request_resource(&mut self, name: &str, number: u32) -> Result<PinGroup, Error>;

    /// Hand out every not-yet-requested resource with this name, lowest number first.
    fn request_all_resources(&mut self, name: &str) -> Vec<PinGroup>;

    /// Size of main RAM already integrated into the SoC core, zero if there is none.
    fn integrated_main_ram_size(&self) -> u32;
}

/// Table-driven [`ResourceProvider`].
#[derive(Debug, Default)]
pub struct BoardResources {
    resources: Vec<PinGroup>,
    requested: BTreeSet<(String, u32)>,
    integrated_main_ram_size: u32,
}

impl BoardResources {
    pub fn new() -> BoardResources { Default::default() }

    /// Catalogue of the Colorlight i5/i9 module on its extension board.
    pub fn colorlight(board: BoardVariant) -> BoardResources {
        let mut resources = vec![
            PinGroup::new("clk25", 0).io_standard(LVCMOS33),
            PinGroup::new("cpu_reset_n", 0).io_standard(LVCMOS33),
            PinGroup::new("user_led_n", 0).io_standard(LVCMOS33),
            PinGroup::new("serial", 0).signals(&["tx", "rx"]).io_standard(LVCMOS33),
            PinGroup::new("spiflash", 0).signals(&["cs_n", "mosi", "miso"]).io_standard(LVCMOS33),
            PinGroup::new("sdram_clock", 0).io_standard(LVCMOS33),
            PinGroup::new("sdram", 0).signals(&["a", "dq", "we_n", "ras_n", "cas_n", "cs_n", "ba"]).io_standard(LVCMOS33),
            PinGroup::new("usb", 0).signals(&["d_p", "d_n", "pullup"]).io_standard(LVCMOS33),
            PinGroup::new("gpdi", 0).signals(&["clk_p", "clk_n", "data0_p", "data0_n", "data1_p", "data1_n", "data2_p", "data2_n"]),
        ];
        for number in 0..2 {
            resources.push(PinGroup::new("eth_clocks", number).signals(&["tx", "rx"]).io_standard(LVCMOS33));
            resources.push(
                PinGroup::new("eth", number)
                    .signals(&["rst_n", "mdio", "mdc", "rx_ctl", "rx_data", "tx_ctl", "tx_data"])
                    .io_standard(LVCMOS33),
            );
        }
        log::debug!("board {} catalogue has {} resources", board, resources.len());
        BoardResources { resources, ..Default::default() }
    }

    /// Board catalogue plus every extension the configuration can use.
    pub fn for_config(config: &SocConfig) -> Result<BoardResources, Error> {
        let mut resources = BoardResources::colorlight(config.board);
        resources.add_extension(radio_spi_extension())?;
        resources.add_extension(sensor_i2c_extension())?;
        resources.add_extension(sdcard_pmod_extension())?;
        resources.set_integrated_main_ram_size(config.integrated_main_ram_size);
        Ok(resources)
    }

    pub fn add_extension(&mut self, extension: Vec<PinGroup>) -> Result<(), Error> {
        for group in extension {
            if self.find(&group.name, group.number).is_some() {
                return Err(Error::DuplicateRegistration(group.label()));
            }
            self.resources.push(group);
        }
        Ok(())
    }

    pub fn set_integrated_main_ram_size(&mut self, size: u32) { self.integrated_main_ram_size = size; }

    pub fn len(&self) -> usize { self.resources.len() }

    pub fn is_empty(&self) -> bool { self.resources.is_empty() }

    fn find(&self, name: &str, number: u32) -> Option<&PinGroup> {
        self.resources.iter().find(|r| r.name == name && r.number == number)
    }
}

impl ResourceProvider for BoardResources {
    fn request_resource(&mut self, name: &str, number: u32) -> Result<PinGroup, Error> {
        let group = self.find(name, number).cloned().ok_or_else(|| Error::MissingResource(name.to_string(), number))?;
        if !self.requested.insert((name.to_string(), number)) {
            return Err(Error::ResourceInUse(name.to_string(), number));
        }
        Ok(group)
    }

    fn request_all_resources(&mut self, name: &str) -> Vec<PinGroup> {
        let mut groups: Vec<PinGroup> = self
            .resources
            .iter()
            .filter(|r| r.name == name && !self.requested.contains(&(r.name.clone(), r.number)))
            .cloned()
            .collect();
        groups.sort_by_key(|g| g.number);
        for group in &groups {
            self.requested.insert((group.name.clone(), group.number));
        }
        groups
    }

    fn integrated_main_ram_size(&self) -> u32 { self.integrated_main_ram_size }
}

/// SPI bus and reset line of the RFM95 LoRa radio.
pub fn radio_spi_extension() -> Vec<PinGroup> {
    vec![
        PinGroup::new("spi", 0)
            .subsignal("clk", "G20")
            .subsignal("mosi", "L18")
            .subsignal("miso", "M18")
            .subsignal("cs_n", "N17")
            .io_standard(LVCMOS33),
        PinGroup::new("lora_reset", 0).pins("L20").io_standard(LVCMOS33),
    ]
}

/// I2C bus of the AHT10 temperature/humidity sensor.
pub fn sensor_i2c_extension() -> Vec<PinGroup> {
    vec![PinGroup::new("i2c", 0).subsignal("scl", "U17").subsignal("sda", "U18").io_standard(LVCMOS33)]
}

/// SD card PMOD, usable in SPI or native mode.
pub fn sdcard_pmod_extension() -> Vec<PinGroup> {
    vec![
        PinGroup::new("spisdcard", 0).signals(&["clk", "mosi", "cs_n", "miso"]).io_standard(LVCMOS33),
        PinGroup::new("sdcard", 0).signals(&["clk", "cmd", "data", "cd"]).io_standard(LVCMOS33),
    ]
}
