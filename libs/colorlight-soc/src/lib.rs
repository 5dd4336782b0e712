//! Clock-domain planning and peripheral composition for Colorlight i5/i9 SoCs.
//!
//! A build runs in one direction: [`SocOptions`] are validated into a [`SocConfig`],
//! the reference clock and reset fan-in feed the [`FrequencyPlanResolver`], the
//! resulting [`ClockDomainSet`] drives feature selection, and the [`BuildPlan`] is
//! composed into an [`AssembledPlatform`] which [`export`] can write out.

pub mod clocks;
pub mod compose;
pub mod config;
pub mod cores;
pub mod domains;
mod error;
pub mod export;
pub mod platform;
pub mod pll;
pub mod reset;
pub mod select;

pub use clocks::{DataRateMode, Ecp5Device, FrequencyPlanResolver, ReferenceClock, ReferenceSource};
pub use compose::{
    compose, AssembledPlatform, FactoryRegistry, PeripheralFactory, RegistrationAuthority, Registry, Subsystem,
};
pub use config::{BoardVariant, SocConfig, SocOptions};
pub use domains::{ClockDomain, ClockDomainSet};
pub use error::Error;
pub use platform::{BoardResources, ResourceProvider};
pub use reset::ResetHandle;
pub use select::{select, select_config, BuildPlan, PeripheralBinding, SubsystemKind};

/// Run a complete build against caller-supplied collaborators.
pub fn build<P, R>(
    options: &SocOptions,
    factories: &FactoryRegistry,
    provider: &mut P,
    registry: &mut R,
) -> Result<AssembledPlatform, Error>
where
    P: ResourceProvider + ?Sized,
    R: RegistrationAuthority + ?Sized,
{
    let config = SocConfig::from_options(options)?;
    log::info!(
        "building {} rev {} ({}), sys {} Hz, sdram {}",
        config.ident(),
        config.revision,
        config.board.device().part(),
        config.sys_clk_freq,
        config.data_rate
    );

    // At build time the button is released and no soft reset is pending.
    provider.request_resource(reset::RESET_BUTTON_RESOURCE, 0)?;
    let reset = ResetHandle::combine(false, true);

    let reference = ReferenceClock::select(config.use_internal_osc);
    if reference.source == ReferenceSource::ExternalPin {
        provider.request_resource(clocks::EXTERNAL_CLOCK_RESOURCE, 0)?;
    }

    let domains = FrequencyPlanResolver::new(config.board.device(), reset).resolve(
        reference,
        config.sys_clk_freq,
        config.data_rate,
        config.want_usb_domain(),
        config.want_video_domain(),
    )?;
    let plan = select_config(&config, &domains, &*provider)?;
    compose(&plan, factories, provider, registry)
}

/// [`build`] with the board catalogue, the default factories and a fresh registry.
pub fn build_default(options: &SocOptions) -> Result<AssembledPlatform, Error> {
    let config = SocConfig::from_options(options)?;
    let mut resources = BoardResources::for_config(&config)?;
    build(options, &cores::default_factories(), &mut resources, &mut Registry::new())
}
