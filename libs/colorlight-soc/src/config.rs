//! Build options.
//!
//! [`SocOptions`] is the flat option set as it arrives from the command line or a JSON
//! file. [`SocConfig`] is the validated form: exclusive options are folded into enums so
//! a conflicting combination cannot be represented once validation has passed.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clocks::{DataRateMode, Ecp5Device};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocOptions {
    pub board: String,
    pub revision: String,
    pub toolchain: String,
    pub sys_clk_freq: f64,
    pub sdram_rate: String,
    pub with_ethernet: bool,
    pub with_etherbone: bool,
    pub local_ip: String,
    pub remote_ip: String,
    pub eth_phy: u32,
    pub with_spi_sdcard: bool,
    pub with_sdcard: bool,
    pub use_internal_osc: bool,
    pub with_video_terminal: bool,
    pub with_video_framebuffer: bool,
    pub with_led_chaser: bool,
    pub with_radio_spi: bool,
    pub with_sensor_i2c: bool,
    pub uart_name: String,
    pub l2_size: u32,
    pub integrated_rom_size: u32,
    pub integrated_sram_size: u32,
    pub integrated_main_ram_size: u32,
}

impl Default for SocOptions {
    fn default() -> SocOptions {
        SocOptions {
            board: "i5".to_string(),
            revision: "7.0".to_string(),
            toolchain: "trellis".to_string(),
            sys_clk_freq: 60e6,
            sdram_rate: "1:1".to_string(),
            with_ethernet: false,
            with_etherbone: false,
            local_ip: "192.168.1.50".to_string(),
            remote_ip: "192.168.1.100".to_string(),
            eth_phy: 0,
            with_spi_sdcard: false,
            with_sdcard: false,
            use_internal_osc: false,
            with_video_terminal: false,
            with_video_framebuffer: false,
            with_led_chaser: true,
            with_radio_spi: false,
            with_sensor_i2c: false,
            uart_name: "serial".to_string(),
            l2_size: 8192,
            integrated_rom_size: 0x2_0000,
            integrated_sram_size: 0x2000,
            integrated_main_ram_size: 0,
        }
    }
}

impl SocOptions {
    pub fn from_json(json: &str) -> Result<SocOptions, Error> { Ok(serde_json::from_str(json)?) }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<SocOptions, Error> {
        Ok(serde_json::from_reader(reader)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoardVariant {
    I5,
    I9,
}

impl BoardVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardVariant::I5 => "i5",
            BoardVariant::I9 => "i9",
        }
    }

    pub fn device(&self) -> Ecp5Device {
        match self {
            BoardVariant::I5 => Ecp5Device::Lfe5u25f,
            BoardVariant::I9 => Ecp5Device::Lfe5u45f,
        }
    }

    pub fn revisions(&self) -> &'static [&'static str] {
        match self {
            BoardVariant::I5 => &["7.0"],
            BoardVariant::I9 => &["7.2"],
        }
    }
}

impl FromStr for BoardVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<BoardVariant, Error> {
        match s.trim().to_lowercase().as_str() {
            "i5" => Ok(BoardVariant::I5),
            "i9" => Ok(BoardVariant::I9),
            _ => Err(Error::UnknownBoardVariant(s.to_string())),
        }
    }
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Toolchain {
    Trellis,
    Diamond,
}

impl FromStr for Toolchain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Toolchain, Error> {
        match s {
            "trellis" => Ok(Toolchain::Trellis),
            "diamond" => Ok(Toolchain::Diamond),
            other => Err(Error::invalid("toolchain", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkSettings {
    pub local_ip: Ipv4Addr,
    pub remote_ip: Ipv4Addr,
    pub phy: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkMode {
    None,
    Ethernet(NetworkSettings),
    Etherbone(NetworkSettings),
}

#[derive(Clone, Copy)]
enum NetworkKind {
    Ethernet,
    Etherbone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StorageMode {
    None,
    SpiSdCard,
    NativeSdCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VideoMode {
    None,
    Terminal,
    Framebuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SerialTransport {
    /// The board's UART pins
    Serial,
    /// CDC-ACM over the USB port, needs the USB clock pair
    UsbAcm,
}

impl FromStr for SerialTransport {
    type Err = Error;

    fn from_str(s: &str) -> Result<SerialTransport, Error> {
        match s {
            "serial" => Ok(SerialTransport::Serial),
            "usb_acm" => Ok(SerialTransport::UsbAcm),
            other => Err(Error::invalid("uart_name", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocConfig {
    pub board: BoardVariant,
    pub revision: String,
    pub toolchain: Toolchain,
    pub sys_clk_freq: f64,
    pub data_rate: DataRateMode,
    pub use_internal_osc: bool,
    pub network: NetworkMode,
    pub storage: StorageMode,
    pub video: VideoMode,
    pub serial: SerialTransport,
    pub with_led_chaser: bool,
    pub with_radio_spi: bool,
    pub with_sensor_i2c: bool,
    pub l2_size: u32,
    pub integrated_rom_size: u32,
    pub integrated_sram_size: u32,
    pub integrated_main_ram_size: u32,
}

/// Pick at most one member of an exclusive group.
fn exclusive<T>(group: &'static str, members: [(bool, T); 2], none: T) -> Result<T, Error> {
    let [(first, a), (second, b)] = members;
    match (first, second) {
        (true, true) => Err(Error::ConflictingFeatureFlags(group)),
        (true, false) => Ok(a),
        (false, true) => Ok(b),
        (false, false) => Ok(none),
    }
}

fn parse_ip(option: &'static str, value: &str) -> Result<Ipv4Addr, Error> {
    value.parse().map_err(|_| Error::invalid(option, value))
}

impl SocConfig {
    /// Validate a raw option set. Exclusive groups are checked first, then the board
    /// variant, then every remaining value.
    pub fn from_options(options: &SocOptions) -> Result<SocConfig, Error> {
        let video = exclusive(
            "video-terminal/video-framebuffer",
            [(options.with_video_terminal, VideoMode::Terminal), (options.with_video_framebuffer, VideoMode::Framebuffer)],
            VideoMode::None,
        )?;
        let storage = exclusive(
            "spi-sdcard/sdcard",
            [(options.with_spi_sdcard, StorageMode::SpiSdCard), (options.with_sdcard, StorageMode::NativeSdCard)],
            StorageMode::None,
        )?;
        let network = exclusive(
            "ethernet/etherbone",
            [(options.with_ethernet, Some(NetworkKind::Ethernet)), (options.with_etherbone, Some(NetworkKind::Etherbone))],
            None,
        )?;

        let board: BoardVariant = options.board.parse()?;

        if !board.revisions().contains(&options.revision.as_str()) {
            return Err(Error::invalid("revision", format!("{} (board {})", options.revision, board)));
        }
        let toolchain = options.toolchain.parse()?;
        if !(options.sys_clk_freq.is_finite() && options.sys_clk_freq > 0.0) {
            return Err(Error::invalid("sys_clk_freq", options.sys_clk_freq));
        }
        let data_rate = options.sdram_rate.parse()?;
        let network = match network {
            None => NetworkMode::None,
            Some(kind) => {
                if options.eth_phy > 1 {
                    return Err(Error::invalid("eth_phy", options.eth_phy));
                }
                let settings = NetworkSettings {
                    local_ip: parse_ip("local_ip", &options.local_ip)?,
                    remote_ip: parse_ip("remote_ip", &options.remote_ip)?,
                    phy: options.eth_phy,
                };
                match kind {
                    NetworkKind::Ethernet => NetworkMode::Ethernet(settings),
                    NetworkKind::Etherbone => NetworkMode::Etherbone(settings),
                }
            }
        };
        let serial = options.uart_name.parse()?;

        Ok(SocConfig {
            board,
            revision: options.revision.clone(),
            toolchain,
            sys_clk_freq: options.sys_clk_freq,
            data_rate,
            use_internal_osc: options.use_internal_osc,
            network,
            storage,
            video,
            serial,
            with_led_chaser: options.with_led_chaser,
            with_radio_spi: options.with_radio_spi,
            with_sensor_i2c: options.with_sensor_i2c,
            l2_size: options.l2_size,
            integrated_rom_size: options.integrated_rom_size,
            integrated_sram_size: options.integrated_sram_size,
            integrated_main_ram_size: options.integrated_main_ram_size,
        })
    }

    pub fn want_usb_domain(&self) -> bool { self.serial == SerialTransport::UsbAcm }

    pub fn want_video_domain(&self) -> bool { self.video != VideoMode::None }

    pub fn ident(&self) -> String { format!("Tarefa05 SoC on Colorlight {}", self.board.as_str().to_uppercase()) }
}
