use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{NetworkMode, SerialTransport};
use crate::domains::{ClockDomain, ClockDomainSet};
use crate::platform::{PinGroup, ResourceProvider};
use crate::select::{BuildPlan, PeripheralBinding, ResourceHandle, SubsystemKind};
use crate::Error;

pub type DynError = Box<dyn std::error::Error>;

pub const CSR_BASE: u32 = 0xf000_0000;
/// Address space given to each CSR bank
pub const CSR_PAGING: u32 = 0x800;

/// Banks owned by the SoC core itself, allocated before any subsystem.
const CORE_CSRS: [&str; 3] = ["ctrl", "identifier_mem", "timer0"];

/// Fixed origins. Regions not listed are placed from `DYNAMIC_REGION_BASE` upwards.
const MEMORY_MAP: [(&str, u32); 5] = [
    ("rom", 0x0000_0000),
    ("sram", 0x1000_0000),
    ("spiflash", 0x2000_0000),
    ("main_ram", 0x4000_0000),
    ("ethmac", 0x8000_0000),
];
const DYNAMIC_REGION_BASE: u32 = 0x9000_0000;
const DYNAMIC_REGION_ALIGN: u32 = 0x0100_0000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionRequest {
    pub name: String,
    pub size: u32,
    pub cached: bool,
}

/// An instantiated peripheral, as reported by its factory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subsystem {
    pub kind: SubsystemKind,
    /// Gateware core(s) implementing the subsystem
    pub core: String,
    pub domain: String,
    /// `name:number` of every pin group handed to the core
    pub pins: Vec<String>,
    /// CSR banks, each gets one `CSR_PAGING` window
    pub csrs: Vec<String>,
    pub region: Option<RegionRequest>,
    pub parameters: BTreeMap<String, String>,
}

impl Subsystem {
    pub fn new(kind: SubsystemKind, core: &str, context: &InstanceContext<'_>) -> Subsystem {
        Subsystem {
            kind,
            core: core.to_string(),
            domain: context.domain.name.to_string(),
            pins: context.resources.iter().map(PinGroup::label).collect(),
            csrs: Vec::new(),
            region: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn csr(mut self, name: &str) -> Subsystem {
        self.csrs.push(name.to_string());
        self
    }

    pub fn region(mut self, name: &str, size: u32, cached: bool) -> Subsystem {
        self.region = Some(RegionRequest { name: name.to_string(), size, cached });
        self
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Subsystem {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }
}

/// Everything a factory gets to build one subsystem.
pub struct InstanceContext<'a> {
    pub binding: &'a PeripheralBinding,
    pub domain: &'a ClockDomain,
    pub resources: &'a [PinGroup],
    /// Achieved frequency of the `sys` domain
    pub sys_clk_freq: f64,
}

pub trait PeripheralFactory {
    fn instantiate(&self, context: &InstanceContext<'_>) -> Result<Subsystem, DynError>;
}

#[derive(Default)]
pub struct FactoryRegistry {
    factories: BTreeMap<SubsystemKind, Box<dyn PeripheralFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> FactoryRegistry { Default::default() }

    /// Returns the factory previously registered for `kind`, if any.
    pub fn register<F>(&mut self, kind: SubsystemKind, factory: F) -> Option<Box<dyn PeripheralFactory>>
    where
        F: PeripheralFactory + 'static,
    {
        self.factories.insert(kind, Box::new(factory))
    }

    pub fn remove(&mut self, kind: SubsystemKind) -> Option<Box<dyn PeripheralFactory>> {
        self.factories.remove(&kind)
    }

    pub fn get(&self, kind: SubsystemKind) -> Option<&dyn PeripheralFactory> {
        self.factories.get(&kind).map(|f| f.as_ref())
    }

    pub fn contains(&self, kind: SubsystemKind) -> bool { self.factories.contains_key(&kind) }

    pub fn len(&self) -> usize { self.factories.len() }

    pub fn is_empty(&self) -> bool { self.factories.is_empty() }
}

pub trait RegistrationAuthority {
    fn register(&mut self, name: &str, subsystem: &Subsystem) -> Result<(), Error>;
}

/// Registration table scoped to a single build.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<(String, SubsystemKind)>,
}

impl Registry {
    pub fn new() -> Registry { Default::default() }

    pub fn contains(&self, name: &str) -> bool { self.entries.iter().any(|(n, _)| n == name) }

    pub fn names(&self) -> Vec<&str> { self.entries.iter().map(|(n, _)| n.as_str()).collect() }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl RegistrationAuthority for Registry {
    fn register(&mut self, name: &str, subsystem: &Subsystem) -> Result<(), Error> {
        if self.contains(name) {
            return Err(Error::DuplicateRegistration(name.to_string()));
        }
        self.entries.push((name.to_string(), subsystem.kind));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub name: String,
    pub base: u32,
    pub size: u32,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsrWindow {
    pub name: String,
    pub base: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSubsystem {
    pub name: String,
    pub subsystem: Subsystem,
}

/// The finished SoC description handed to gateware generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledPlatform {
    pub ident: String,
    pub device: &'static str,
    pub domains: ClockDomainSet,
    pub subsystems: Vec<NamedSubsystem>,
    pub memory_regions: Vec<MemoryRegion>,
    pub csr_base: u32,
    pub csrs: Vec<CsrWindow>,
    pub constants: BTreeMap<String, String>,
}

impl AssembledPlatform {
    fn new(ident: String, device: &'static str, domains: ClockDomainSet) -> AssembledPlatform {
        AssembledPlatform {
            ident,
            device,
            domains,
            subsystems: Vec::new(),
            memory_regions: Vec::new(),
            csr_base: CSR_BASE,
            csrs: Vec::new(),
            constants: BTreeMap::new(),
        }
    }

    pub fn subsystem(&self, name: &str) -> Option<&Subsystem> {
        self.subsystems.iter().find(|s| s.name == name).map(|s| &s.subsystem)
    }

    pub fn region(&self, name: &str) -> Option<&MemoryRegion> { self.memory_regions.iter().find(|r| r.name == name) }

    pub fn csr(&self, name: &str) -> Option<&CsrWindow> { self.csrs.iter().find(|c| c.name == name) }

    fn claim_csr(&mut self, name: &str) -> Result<(), Error> {
        if self.csr(name).is_some() {
            return Err(Error::DuplicateRegistration(format!("csr {}", name)));
        }
        let base = self.csr_base + self.csrs.len() as u32 * CSR_PAGING;
        log::debug!("csr {} at {:08x}", name, base);
        self.csrs.push(CsrWindow { name: name.to_string(), base });
        Ok(())
    }

    fn claim_region(&mut self, request: &RegionRequest) -> Result<(), Error> {
        if self.region(&request.name).is_some() {
            return Err(Error::DuplicateRegistration(format!("memory region {}", request.name)));
        }
        let overlap = |other: &str| Error::RegionOverlap { name: request.name.clone(), other: other.to_string() };
        // Ranges are compared in u64 so the end of a region can't wrap.
        let end = |base: u32, size: u32| base as u64 + size as u64;

        let base = match MEMORY_MAP.iter().find(|(name, _)| *name == request.name) {
            Some((_, base)) => *base as u64,
            None => {
                let top = self
                    .memory_regions
                    .iter()
                    .filter(|r| r.base >= DYNAMIC_REGION_BASE)
                    .map(|r| end(r.base, r.size))
                    .max()
                    .unwrap_or(DYNAMIC_REGION_BASE as u64);
                let align = DYNAMIC_REGION_ALIGN as u64;
                (top + align - 1) & !(align - 1)
            }
        };
        let top = base + request.size as u64;
        if top > self.csr_base as u64 {
            return Err(overlap("csr"));
        }
        if let Some(other) = self.memory_regions.iter().find(|r| base < end(r.base, r.size) && (r.base as u64) < top) {
            return Err(overlap(&other.name));
        }
        // Ends below the CSR base, so the base fits in 32 bits
        let base = base as u32;
        log::debug!("region {} at {:08x} ({} bytes)", request.name, base, request.size);
        self.memory_regions.push(MemoryRegion {
            name: request.name.clone(),
            base,
            size: request.size,
            cached: request.cached,
        });
        Ok(())
    }
}

fn request_resources<P>(provider: &mut P, handle: &ResourceHandle) -> Result<Vec<PinGroup>, Error>
where
    P: ResourceProvider + ?Sized,
{
    let mut groups = Vec::new();
    for request in &handle.requests {
        match request.number {
            Some(number) => groups.push(provider.request_resource(request.name, number)?),
            None => {
                let all = provider.request_all_resources(request.name);
                if all.is_empty() {
                    return Err(Error::MissingResource(request.name.to_string(), 0));
                }
                groups.extend(all);
            }
        }
    }
    Ok(groups)
}

/// Instantiate every binding of `plan`, in order, and collect the result.
///
/// Factory availability is checked for the whole plan before the first subsystem
/// is built, so a missing factory leaves the registry and provider untouched.
pub fn compose<P, R>(
    plan: &BuildPlan,
    factories: &FactoryRegistry,
    provider: &mut P,
    registry: &mut R,
) -> Result<AssembledPlatform, Error>
where
    P: ResourceProvider + ?Sized,
    R: RegistrationAuthority + ?Sized,
{
    if let Some(binding) = plan.bindings().iter().find(|b| !factories.contains(b.kind)) {
        return Err(Error::FactoryUnavailable(binding.kind));
    }

    let config = plan.config();
    let domains = plan.domains();
    let mut platform = AssembledPlatform::new(config.ident(), config.board.device().part(), domains.clone());

    if config.integrated_rom_size > 0 {
        platform.claim_region(&RegionRequest { name: "rom".into(), size: config.integrated_rom_size, cached: true })?;
    }
    if config.integrated_sram_size > 0 {
        platform.claim_region(&RegionRequest { name: "sram".into(), size: config.integrated_sram_size, cached: true })?;
    }
    let integrated_main_ram = provider.integrated_main_ram_size();
    if integrated_main_ram > 0 {
        platform.claim_region(&RegionRequest { name: "main_ram".into(), size: integrated_main_ram, cached: true })?;
    }
    for csr in CORE_CSRS {
        platform.claim_csr(csr)?;
    }
    if config.serial == SerialTransport::Serial {
        platform.claim_csr("uart")?;
    }

    for binding in plan.bindings() {
        let domain = domains.get(binding.domain).ok_or_else(|| Error::MissingPrerequisiteDomain {
            required_by: binding.name.to_string(),
            domain: binding.domain,
        })?;
        let factory = factories.get(binding.kind).ok_or(Error::FactoryUnavailable(binding.kind))?;
        let resources = request_resources(provider, &binding.resource)?;
        let context =
            InstanceContext { binding, domain, resources: &resources, sys_clk_freq: domains.sys().frequency_hz };
        let subsystem =
            factory.instantiate(&context).map_err(|e| Error::FactoryFailed(binding.kind, e.to_string()))?;

        registry.register(binding.name, &subsystem)?;
        for csr in &subsystem.csrs {
            platform.claim_csr(csr)?;
        }
        if let Some(region) = &subsystem.region {
            platform.claim_region(region)?;
        }
        log::info!("{}: {} in {} ({})", binding.name, subsystem.core, subsystem.domain, subsystem.pins.join(" "));
        platform.subsystems.push(NamedSubsystem { name: binding.name.to_string(), subsystem });
    }

    platform.constants.insert("config_clock_frequency".into(), format!("{}", domains.sys().frequency_hz as u64));
    platform.constants.insert("config_sdram_rate".into(), config.data_rate.as_str().into());
    if let NetworkMode::Ethernet(settings) | NetworkMode::Etherbone(settings) = config.network {
        platform.constants.insert("localip".into(), settings.local_ip.to_string());
        platform.constants.insert("remoteip".into(), settings.remote_ip.to_string());
    }
    Ok(platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocks::{FrequencyPlanResolver, ReferenceClock};
    use crate::config::{SocConfig, SocOptions};
    use crate::cores::default_factories;
    use crate::platform::BoardResources;
    use crate::reset::ResetHandle;
    use crate::select::select_config;

    fn plan_for(options: &SocOptions) -> (BuildPlan, BoardResources) {
        let config = SocConfig::from_options(options).unwrap();
        let domains = FrequencyPlanResolver::new(config.board.device(), ResetHandle::released())
            .resolve(
                ReferenceClock::external_pin(),
                config.sys_clk_freq,
                config.data_rate,
                config.want_usb_domain(),
                config.want_video_domain(),
            )
            .unwrap();
        let resources = BoardResources::for_config(&config).unwrap();
        (select_config(&config, &domains, &resources).unwrap(), resources)
    }

    fn radio_options() -> SocOptions {
        let mut options = SocOptions::default();
        options.with_radio_spi = true;
        options.with_sensor_i2c = true;
        options
    }

    #[test]
    fn registers_in_plan_order() {
        let (plan, mut resources) = plan_for(&radio_options());
        let mut registry = Registry::new();
        let platform = compose(&plan, &default_factories(), &mut resources, &mut registry).unwrap();
        assert_eq!(registry.names(), vec!["sdram", "spiflash", "leds", "spi", "i2c"]);
        let names: Vec<&str> = platform.subsystems.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, registry.names());
        assert_eq!(platform.subsystem("spi").unwrap().pins, vec!["spi:0", "lora_reset:0"]);
        assert_eq!(platform.constants["config_clock_frequency"], "60000000");
    }

    #[test]
    fn csr_windows_are_contiguous() {
        let (plan, mut resources) = plan_for(&radio_options());
        let platform = compose(&plan, &default_factories(), &mut resources, &mut Registry::new()).unwrap();
        for (index, csr) in platform.csrs.iter().enumerate() {
            assert_eq!(csr.base, CSR_BASE + index as u32 * CSR_PAGING, "{}", csr.name);
        }
        assert_eq!(platform.csrs[0].name, "ctrl");
        assert!(platform.csr("lora_reset").is_some());
        let spi = platform.csr("spi").unwrap().base;
        let i2c = platform.csr("i2c").unwrap().base;
        assert!(spi < i2c);
    }

    #[test]
    fn memory_map() {
        let (plan, mut resources) = plan_for(&SocOptions::default());
        let platform = compose(&plan, &default_factories(), &mut resources, &mut Registry::new()).unwrap();
        let main_ram = platform.region("main_ram").unwrap();
        assert_eq!(main_ram.base, 0x4000_0000);
        assert_eq!(main_ram.size, 8 * 1024 * 1024);
        let flash = platform.region("spiflash").unwrap();
        assert_eq!((flash.base, flash.size), (0x2000_0000, 2 * 1024 * 1024));
        assert_eq!(platform.region("rom").unwrap().size, 0x2_0000);
    }

    #[test]
    fn missing_factory_has_no_side_effects() {
        let (plan, mut resources) = plan_for(&radio_options());
        let mut factories = default_factories();
        factories.remove(SubsystemKind::I2cMaster);
        let mut registry = Registry::new();
        assert!(matches!(
            compose(&plan, &factories, &mut resources, &mut registry),
            Err(Error::FactoryUnavailable(SubsystemKind::I2cMaster))
        ));
        assert!(registry.is_empty());
        assert!(resources.request_resource("spi", 0).is_ok());
    }

    #[test]
    fn duplicate_registration_is_reported() {
        let (plan, mut resources) = plan_for(&SocOptions::default());
        let mut registry = Registry::new();
        let squatter = Subsystem {
            kind: SubsystemKind::LedSequencer,
            core: "squatter".into(),
            domain: "sys".into(),
            pins: Vec::new(),
            csrs: Vec::new(),
            region: None,
            parameters: BTreeMap::new(),
        };
        registry.register("spiflash", &squatter).unwrap();
        assert!(matches!(
            compose(&plan, &default_factories(), &mut resources, &mut registry),
            Err(Error::DuplicateRegistration(name)) if name == "spiflash"
        ));
    }

    struct Broken;

    impl PeripheralFactory for Broken {
        fn instantiate(&self, _context: &InstanceContext<'_>) -> Result<Subsystem, DynError> {
            Err("no LEDs today".into())
        }
    }

    struct Blinky;

    impl PeripheralFactory for Blinky {
        fn instantiate(&self, context: &InstanceContext<'_>) -> Result<Subsystem, DynError> {
            Ok(Subsystem::new(SubsystemKind::LedSequencer, "Blinky", context).csr("blinky"))
        }
    }

    #[test]
    fn factory_errors_propagate() {
        let (plan, mut resources) = plan_for(&SocOptions::default());
        let mut factories = default_factories();
        factories.register(SubsystemKind::LedSequencer, Broken);
        assert!(matches!(
            compose(&plan, &factories, &mut resources, &mut Registry::new()),
            Err(Error::FactoryFailed(SubsystemKind::LedSequencer, _))
        ));
    }

    #[test]
    fn factories_can_be_replaced() {
        let (plan, mut resources) = plan_for(&SocOptions::default());
        let mut factories = default_factories();
        assert!(factories.register(SubsystemKind::LedSequencer, Blinky).is_some());
        let platform = compose(&plan, &factories, &mut resources, &mut Registry::new()).unwrap();
        assert_eq!(platform.subsystem("leds").unwrap().core, "Blinky");
        assert!(platform.csr("blinky").is_some());
        assert!(platform.csr("leds").is_none());
    }

    struct Scratchpad(u32);

    impl PeripheralFactory for Scratchpad {
        fn instantiate(&self, context: &InstanceContext<'_>) -> Result<Subsystem, DynError> {
            let region = format!("{}_mem", context.binding.name);
            Ok(Subsystem::new(context.binding.kind, "Scratchpad", context).region(&region, self.0, false))
        }
    }

    fn with_scratchpads(size: u32) -> Result<AssembledPlatform, Error> {
        let (plan, mut resources) = plan_for(&radio_options());
        let mut factories = default_factories();
        factories.register(SubsystemKind::LedSequencer, Scratchpad(size));
        factories.register(SubsystemKind::SpiMaster, Scratchpad(size));
        compose(&plan, &factories, &mut resources, &mut Registry::new())
    }

    #[test]
    fn oversized_rom_overlaps_sram() {
        let mut options = SocOptions::default();
        options.integrated_rom_size = 0x2000_0000;
        let (plan, mut resources) = plan_for(&options);
        assert!(matches!(
            compose(&plan, &default_factories(), &mut resources, &mut Registry::new()),
            Err(Error::RegionOverlap { name, other }) if name == "sram" && other == "rom"
        ));
    }

    #[test]
    fn dynamic_regions_stop_at_csr_space() {
        let platform = with_scratchpads(0x100_0000).unwrap();
        let leds = platform.region("leds_mem").unwrap();
        let spi = platform.region("spi_mem").unwrap();
        assert_eq!(leds.base, 0x9000_0000);
        assert_eq!(spi.base, 0x9100_0000);

        assert!(matches!(
            with_scratchpads(0x4000_0000),
            Err(Error::RegionOverlap { name, other }) if name == "spi_mem" && other == "csr"
        ));
        assert!(matches!(
            with_scratchpads(0x7000_0000),
            Err(Error::RegionOverlap { name, other }) if name == "leds_mem" && other == "csr"
        ));
    }

    #[test]
    fn integrated_main_ram() {
        let mut options = SocOptions::default();
        options.integrated_main_ram_size = 0x1_0000;
        let (plan, mut resources) = plan_for(&options);
        let platform = compose(&plan, &default_factories(), &mut resources, &mut Registry::new()).unwrap();
        assert!(platform.subsystem("sdram").is_none());
        assert_eq!(platform.region("main_ram").unwrap().size, 0x1_0000);
    }
}
