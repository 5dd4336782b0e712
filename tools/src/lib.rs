#[macro_use]
extern crate clap;

use std::fs::File;

use clap::{App, Arg, ArgMatches};
use colorlight_soc::export::parse_u32;
use colorlight_soc::{Error, SocOptions};

/// Boolean switches that map one-to-one onto an option field.
const SWITCHES: [(&str, &str); 10] = [
    ("with-ethernet", "Enable Ethernet support"),
    ("with-etherbone", "Enable Etherbone support"),
    ("with-spi-sdcard", "Enable SPI-mode SDCard support"),
    ("with-sdcard", "Enable SDCard support"),
    ("use-internal-osc", "Use internal oscillator instead of the 25 MHz pin"),
    ("with-video-terminal", "Enable Video Terminal (HDMI)"),
    ("with-video-framebuffer", "Enable Video Framebuffer (HDMI)"),
    ("with-radio-spi", "Add the SPI master and reset GPIO of the LoRa radio"),
    ("with-sensor-i2c", "Add the I2C master of the temperature sensor"),
    ("no-led-chaser", "Leave out the LED chaser"),
];

pub fn app<'a, 'b>() -> App<'a, 'b> {
    let mut app = App::new("Colorlight SoC planner")
        .version(crate_version!())
        .about("Plan clock domains and peripherals for a Colorlight i5/i9 SoC")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("OPTIONS_JSON")
                .takes_value(true)
                .help("JSON file with build options; flags given here override it"),
        )
        .arg(
            Arg::with_name("board")
                .long("board")
                .takes_value(true)
                .help("Board type (i5 or i9)"),
        )
        .arg(Arg::with_name("revision").long("revision").takes_value(true).help("Board revision"))
        .arg(
            Arg::with_name("toolchain")
                .long("toolchain")
                .takes_value(true)
                .possible_values(&["trellis", "diamond"])
                .help("FPGA toolchain"),
        )
        .arg(
            Arg::with_name("sys-clk-freq")
                .long("sys-clk-freq")
                .value_name("HZ")
                .takes_value(true)
                .help("System clock frequency"),
        )
        .arg(
            Arg::with_name("sdram-rate")
                .long("sdram-rate")
                .takes_value(true)
                .possible_values(&["1:1", "1:2"])
                .help("SDRAM rate"),
        )
        .arg(Arg::with_name("local-ip").long("local-ip").takes_value(true).help("Local IP address"))
        .arg(Arg::with_name("remote-ip").long("remote-ip").takes_value(true).help("Remote IP address of TFTP server"))
        .arg(Arg::with_name("eth-phy").long("eth-phy").takes_value(true).help("Ethernet PHY (0 or 1)"))
        .arg(
            Arg::with_name("uart-name")
                .long("uart-name")
                .takes_value(true)
                .possible_values(&["serial", "usb_acm"])
                .help("Serial transport"),
        )
        .arg(Arg::with_name("l2-size").long("l2-size").value_name("BYTES").takes_value(true).help("L2 cache size"))
        .arg(
            Arg::with_name("integrated-main-ram-size")
                .long("integrated-main-ram-size")
                .value_name("BYTES")
                .takes_value(true)
                .help("Use integrated main RAM instead of SDRAM"),
        )
        .arg(
            Arg::with_name("csr-csv")
                .long("csr-csv")
                .value_name("CSR_CSV")
                .takes_value(true)
                .help("Write the CSR map to this file"),
        )
        .arg(
            Arg::with_name("check")
                .long("check")
                .requires("csr-csv")
                .help("Read the written CSR map back and compare it with the plan"),
        )
        .arg(
            Arg::with_name("json")
                .long("json")
                .value_name("PLAN_JSON")
                .takes_value(true)
                .help("Write the assembled platform as JSON to this file"),
        );
    for (name, help) in SWITCHES {
        let mut arg = Arg::with_name(name).long(name).help(help);
        // Names used by the upstream target script
        match name {
            "with-radio-spi" => arg = arg.alias("with-lora"),
            "with-sensor-i2c" => arg = arg.alias("with-aht10"),
            _ => (),
        }
        app = app.arg(arg);
    }
    app
}

fn parse<T: std::str::FromStr>(matches: &ArgMatches, option: &'static str) -> Result<Option<T>, Error> {
    match matches.value_of(option) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidOption { option, value: value.to_string() }),
    }
}

fn parse_size(matches: &ArgMatches, option: &'static str) -> Result<Option<u32>, Error> {
    match matches.value_of(option) {
        None => Ok(None),
        Some(value) => {
            parse_u32(value).map(Some).map_err(|_| Error::InvalidOption { option, value: value.to_string() })
        }
    }
}

/// Options from `--config` (or the defaults) with every given flag applied on top.
pub fn options_from_matches(matches: &ArgMatches) -> Result<SocOptions, Error> {
    let mut options = match matches.value_of("config") {
        Some(path) => SocOptions::from_reader(File::open(path)?)?,
        None => SocOptions::default(),
    };

    if let Some(board) = matches.value_of("board") {
        options.board = board.to_string();
    }
    if let Some(revision) = matches.value_of("revision") {
        options.revision = revision.to_string();
    }
    if let Some(toolchain) = matches.value_of("toolchain") {
        options.toolchain = toolchain.to_string();
    }
    if let Some(freq) = parse::<f64>(matches, "sys-clk-freq")? {
        options.sys_clk_freq = freq;
    }
    if let Some(rate) = matches.value_of("sdram-rate") {
        options.sdram_rate = rate.to_string();
    }
    if let Some(ip) = matches.value_of("local-ip") {
        options.local_ip = ip.to_string();
    }
    if let Some(ip) = matches.value_of("remote-ip") {
        options.remote_ip = ip.to_string();
    }
    if let Some(phy) = parse::<u32>(matches, "eth-phy")? {
        options.eth_phy = phy;
    }
    if let Some(uart) = matches.value_of("uart-name") {
        options.uart_name = uart.to_string();
    }
    if let Some(size) = parse_size(matches, "l2-size")? {
        options.l2_size = size;
    }
    if let Some(size) = parse_size(matches, "integrated-main-ram-size")? {
        options.integrated_main_ram_size = size;
    }

    let set = |name| matches.is_present(name);
    options.with_ethernet |= set("with-ethernet");
    options.with_etherbone |= set("with-etherbone");
    options.with_spi_sdcard |= set("with-spi-sdcard");
    options.with_sdcard |= set("with-sdcard");
    options.use_internal_osc |= set("use-internal-osc");
    options.with_video_terminal |= set("with-video-terminal");
    options.with_video_framebuffer |= set("with-video-framebuffer");
    options.with_radio_spi |= set("with-radio-spi");
    options.with_sensor_i2c |= set("with-sensor-i2c");
    if set("no-led-chaser") {
        options.with_led_chaser = false;
    }
    log::debug!("options: {:?}", options);
    Ok(options)
}
