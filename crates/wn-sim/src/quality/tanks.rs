//! Tank mixing models.
//!
//! Every model conserves mass exactly: what enters during a step either
//! stays in the store or leaves with the outflow concentration returned by
//! [`TankQuality::mix`].

use std::collections::VecDeque;

use wn_model::{MixingModel, Tank};

use super::segments::Segment;

/// Contents of a storage tank.
#[derive(Debug, Clone, PartialEq)]
pub enum TankStore {
    /// Complete mixing.
    Mixed { conc: f64 },
    /// Mixing zone of fixed maximum volume next to the inlet/outlet, and
    /// an ambient zone that only exchanges with it.
    TwoCompartment {
        v1max: f64,
        mixing: Segment,
        ambient: Segment,
    },
    /// Plug flow. FIFO draws the oldest water (front), LIFO the newest (back).
    Stacked {
        segments: VecDeque<Segment>,
        lifo: bool,
    },
}

/// Quality state of one tank.
#[derive(Debug, Clone, PartialEq)]
pub struct TankQuality {
    pub volume: f64,
    pub store: TankStore,
    /// Concentration of the last outflow.
    pub outflow_conc: f64,
}

impl TankQuality {
    pub fn new(tank: &Tank, conc: f64) -> Self {
        let volume = tank.v0;
        let store = match tank.mixing {
            MixingModel::Mixed => TankStore::Mixed { conc },
            MixingModel::TwoComp => {
                let v1 = volume.min(tank.v1max);
                TankStore::TwoCompartment {
                    v1max: tank.v1max,
                    mixing: Segment { volume: v1, conc },
                    ambient: Segment {
                        volume: volume - v1,
                        conc,
                    },
                }
            }
            MixingModel::Fifo | MixingModel::Lifo => TankStore::Stacked {
                segments: VecDeque::from([Segment { volume, conc }]),
                lifo: tank.mixing == MixingModel::Lifo,
            },
        };
        Self {
            volume,
            store,
            outflow_conc: conc,
        }
    }

    pub fn mass(&self) -> f64 {
        match &self.store {
            TankStore::Mixed { conc } => conc * self.volume,
            TankStore::TwoCompartment {
                mixing, ambient, ..
            } => mixing.mass() + ambient.mass(),
            TankStore::Stacked { segments, .. } => segments.iter().map(Segment::mass).sum(),
        }
    }

    /// Concentration reported for the tank node.
    pub fn conc(&self) -> f64 {
        match &self.store {
            TankStore::Mixed { conc } => *conc,
            TankStore::TwoCompartment { mixing, .. } => mixing.conc,
            TankStore::Stacked { segments, lifo } => {
                let outlet = if *lifo { segments.back() } else { segments.front() };
                outlet.map_or(self.outflow_conc, |s| s.conc)
            }
        }
    }

    /// Apply `rate(c)` (concentration per second) over `dt` to every parcel
    /// of the tank and return the mass gained.
    pub fn react(&mut self, dt: f64, rate: impl Fn(f64) -> f64) -> f64 {
        let step = |c: f64| (c + rate(c) * dt).max(0.0);
        let before = self.mass();
        match &mut self.store {
            TankStore::Mixed { conc } => *conc = step(*conc),
            TankStore::TwoCompartment {
                mixing, ambient, ..
            } => {
                mixing.conc = step(mixing.conc);
                ambient.conc = step(ambient.conc);
            }
            TankStore::Stacked { segments, .. } => {
                for s in segments.iter_mut() {
                    s.conc = step(s.conc);
                }
            }
        }
        self.mass() - before
    }

    /// Mix `vin` of water carrying `min` into the tank while `vout` leaves.
    ///
    /// Returns the outflow concentration. Segments of stacked tanks are
    /// merged when within `tol`.
    pub fn mix(&mut self, vin: f64, min: f64, vout: f64, tol: f64) -> f64 {
        let cin = if vin > 0.0 { min / vin } else { 0.0 };
        let volume = self.volume;
        let (c_out, new_volume) = match &mut self.store {
            TankStore::Mixed { conc } => {
                let total = volume + vin;
                let m = *conc * volume + min;
                if total > 0.0 {
                    *conc = m / total;
                }
                if vout >= total {
                    let c = if vout > 0.0 { m / vout } else { *conc };
                    (c, 0.0)
                } else {
                    (*conc, total - vout)
                }
            }
            TankStore::TwoCompartment {
                v1max,
                mixing,
                ambient,
            } => {
                let vnet = vin - vout;
                if vnet >= 0.0 {
                    let v1 = mixing.volume + vin;
                    if v1 > 0.0 {
                        mixing.conc = (mixing.mass() + min) / v1;
                    }
                    let overflow = (mixing.volume + vnet - *v1max).max(0.0);
                    if overflow > 0.0 {
                        let v2 = ambient.volume + overflow;
                        ambient.conc = (ambient.mass() + overflow * mixing.conc) / v2;
                        ambient.volume = v2;
                        mixing.volume = *v1max;
                    } else {
                        mixing.volume += vnet;
                    }
                    (mixing.conc, mixing.volume + ambient.volume)
                } else {
                    let transfer = ambient.volume.min(-vnet);
                    let v1 = mixing.volume + vin + transfer;
                    let m1 = mixing.mass() + min + ambient.conc * transfer;
                    ambient.volume -= transfer;
                    if ambient.volume <= 0.0 {
                        ambient.volume = 0.0;
                    }
                    if vout >= v1 {
                        mixing.volume = 0.0;
                        let c = if vout > 0.0 { m1 / vout } else { mixing.conc };
                        (c, ambient.volume)
                    } else {
                        if v1 > 0.0 {
                            mixing.conc = m1 / v1;
                        }
                        mixing.volume = v1 - vout;
                        (mixing.conc, mixing.volume + ambient.volume)
                    }
                }
            }
            TankStore::Stacked { segments, lifo } => {
                if *lifo {
                    mix_lifo(segments, vin, cin, vout, tol)
                } else {
                    mix_fifo(segments, vin, cin, vout, tol)
                }
            }
        };
        self.volume = new_volume;
        self.outflow_conc = c_out;
        c_out
    }
}

fn push_merged(segments: &mut VecDeque<Segment>, volume: f64, conc: f64, tol: f64) {
    if volume <= 0.0 {
        return;
    }
    if let Some(last) = segments.back_mut()
        && (last.conc - conc).abs() < tol
    {
        let total = last.volume + volume;
        last.conc = (last.mass() + volume * conc) / total;
        last.volume = total;
        return;
    }
    segments.push_back(Segment { volume, conc });
}

/// Take `volume` from the front (`from_back == false`) or back of the stack.
fn withdraw(segments: &mut VecDeque<Segment>, volume: f64, from_back: bool) -> (f64, f64) {
    let mut remaining = volume;
    let mut taken = 0.0;
    let mut mass = 0.0;
    while remaining > 0.0 {
        let seg = if from_back {
            segments.back_mut()
        } else {
            segments.front_mut()
        };
        let Some(seg) = seg else {
            break;
        };
        if seg.volume <= remaining {
            remaining -= seg.volume;
            taken += seg.volume;
            mass += seg.mass();
            if from_back {
                segments.pop_back();
            } else {
                segments.pop_front();
            }
        } else {
            seg.volume -= remaining;
            taken += remaining;
            mass += remaining * seg.conc;
            remaining = 0.0;
        }
    }
    (taken, mass)
}

fn stack_volume(segments: &VecDeque<Segment>) -> f64 {
    segments.iter().map(|s| s.volume).sum()
}

/// Inflow joins the back; outflow leaves from the front.
fn mix_fifo(
    segments: &mut VecDeque<Segment>,
    vin: f64,
    cin: f64,
    vout: f64,
    tol: f64,
) -> (f64, f64) {
    let oldest = segments.front().map_or(cin, |s| s.conc);
    push_merged(segments, vin, cin, tol);
    let (_, mass) = withdraw(segments, vout, false);
    let c = if vout > 0.0 { mass / vout } else { oldest };
    (c, stack_volume(segments))
}

/// While filling the inflow passes straight to the outflow and only the
/// net gain is stored; while emptying the newest water leaves first.
fn mix_lifo(
    segments: &mut VecDeque<Segment>,
    vin: f64,
    cin: f64,
    vout: f64,
    tol: f64,
) -> (f64, f64) {
    let vnet = vin - vout;
    if vnet >= 0.0 {
        push_merged(segments, vnet, cin, tol);
        return (cin, stack_volume(segments));
    }
    let (vsum, msum) = withdraw(segments, -vnet, true);
    // An overdrawn store releases only what it held, spread over `vout`.
    let total = (vsum + vin).max(vout);
    let c = if total > 0.0 {
        (msum + cin * vin) / total
    } else {
        segments.back().map_or(cin, |s| s.conc)
    };
    (c, stack_volume(segments))
}
