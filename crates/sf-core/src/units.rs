// sf-core/src/units.rs

use uom::si::f64::{
    MassRate as UomMassRate, Pressure as UomPressure,
    ThermodynamicTemperature as UomThermodynamicTemperature,
};

// Public canonical unit types (SI, f64)
pub type MassRate = UomMassRate;
pub type Pressure = UomPressure;
pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn kgps(v: f64) -> MassRate {
    use uom::si::mass_rate::kilogram_per_second;
    MassRate::new::<kilogram_per_second>(v)
}

/// Ideal-gas constants for the fluids the component library knows about.
pub mod constants {
    /// Standard atmosphere (Pa).
    pub const P_ATM_PA: f64 = 101_325.0;
    /// Specific gas constant of dry air (J/kg/K).
    pub const R_AIR: f64 = 287.05;
    /// Heat capacity ratio of dry air.
    pub const GAMMA_AIR: f64 = 1.4;
}
