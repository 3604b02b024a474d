// wn-core/src/units.rs

use uom::si::f64::{Length as UomLength, Power as UomPower, VolumeRate as UomVolumeRate};

pub type Length = UomLength;
pub type Power = UomPower;
pub type VolumeRate = UomVolumeRate;

/// Flow units accepted in network descriptions.
///
/// The flow unit also fixes the unit system of every other quantity:
/// US units use feet/inches/horsepower, SI units use meters/millimeters/kilowatts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum FlowUnits {
    Cfs,
    #[default]
    Gpm,
    Mgd,
    Lps,
    Lpm,
    Cmh,
    Cmd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitSystem {
    Us,
    Si,
}

impl FlowUnits {
    pub fn system(self) -> UnitSystem {
        match self {
            FlowUnits::Cfs | FlowUnits::Gpm | FlowUnits::Mgd => UnitSystem::Us,
            _ => UnitSystem::Si,
        }
    }

    /// Multiplier taking a value in these units to cubic feet per second.
    pub fn to_cfs(self) -> f64 {
        use uom::si::volume_rate::{
            cubic_foot_per_second, cubic_meter_per_second, gallon_per_minute, liter_per_second,
        };
        let cfs_of = |q: VolumeRate| q.get::<cubic_foot_per_second>();
        match self {
            FlowUnits::Cfs => 1.0,
            FlowUnits::Gpm => cfs_of(VolumeRate::new::<gallon_per_minute>(1.0)),
            FlowUnits::Mgd => cfs_of(VolumeRate::new::<gallon_per_minute>(1.0e6 / 1440.0)),
            FlowUnits::Lps => cfs_of(VolumeRate::new::<liter_per_second>(1.0)),
            FlowUnits::Lpm => cfs_of(VolumeRate::new::<liter_per_second>(1.0 / 60.0)),
            FlowUnits::Cmh => cfs_of(VolumeRate::new::<cubic_meter_per_second>(1.0 / 3600.0)),
            FlowUnits::Cmd => cfs_of(VolumeRate::new::<cubic_meter_per_second>(1.0 / 86_400.0)),
        }
    }
}

impl UnitSystem {
    /// Multiplier for elevations, lengths and heads (ft or m) to feet.
    pub fn length_to_ft(self) -> f64 {
        use uom::si::length::{foot, meter};
        match self {
            UnitSystem::Us => 1.0,
            UnitSystem::Si => Length::new::<meter>(1.0).get::<foot>(),
        }
    }

    /// Multiplier for pipe diameters (in or mm) to feet.
    pub fn diameter_to_ft(self) -> f64 {
        use uom::si::length::{foot, inch, millimeter};
        match self {
            UnitSystem::Us => Length::new::<inch>(1.0).get::<foot>(),
            UnitSystem::Si => Length::new::<millimeter>(1.0).get::<foot>(),
        }
    }

    /// Multiplier for Darcy-Weisbach roughness (millifeet or mm) to feet.
    pub fn dw_roughness_to_ft(self) -> f64 {
        use uom::si::length::{foot, millimeter};
        match self {
            UnitSystem::Us => 1.0e-3,
            UnitSystem::Si => Length::new::<millimeter>(1.0).get::<foot>(),
        }
    }

    /// Multiplier for pump power (hp or kW) to horsepower.
    pub fn power_to_hp(self) -> f64 {
        use uom::si::power::{horsepower, kilowatt};
        match self {
            UnitSystem::Us => 1.0,
            UnitSystem::Si => Power::new::<kilowatt>(1.0).get::<horsepower>(),
        }
    }
}
