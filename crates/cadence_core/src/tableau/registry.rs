//! Named Runge-Kutta schemes.
//!
//! Coefficients follow Hairer, Nørsett & Wanner (explicit and collocation
//! families) and Alexander / Nørsett for the SDIRK methods.

use std::collections::HashMap;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};

use super::ButcherTableau;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    ForwardEuler,
    BackwardEuler,
    Explicit4Stage,
    Explicit38Rule,
    Explicit2Stage2ndOrderRunge,
    Explicit3Stage3rdOrderHeun,
    Explicit3Stage3rdOrder,
    Explicit4Stage3rdOrderRunge,
    Gauss1Stage2ndOrder,
    Gauss2Stage4thOrder,
    Gauss3Stage6thOrder,
    RadauLeft1Stage1stOrder,
    RadauLeft2Stage3rdOrder,
    RadauLeft3Stage5thOrder,
    RadauRight1Stage1stOrder,
    RadauRight2Stage3rdOrder,
    RadauRight3Stage5thOrder,
    LobattoA2Stage2ndOrder,
    LobattoA3Stage4thOrder,
    LobattoA4Stage6thOrder,
    LobattoB2Stage2ndOrder,
    LobattoB3Stage4thOrder,
    LobattoB4Stage6thOrder,
    LobattoC2Stage2ndOrder,
    LobattoC3Stage4thOrder,
    LobattoC4Stage6thOrder,
    HammerHollingsworth2Stage4thOrder,
    KuntzmannButcher3Stage6thOrder,
    KuntzmannButcher4Stage8thOrder,
    Dirk2Stage3rdOrder,
    Sdirk2Stage3rdOrder,
    Sdirk5Stage5thOrder,
    Sdirk5Stage4thOrder,
    Sdirk3Stage4thOrder,
}

impl Scheme {
    pub const ALL: [Scheme; 34] = [
        Scheme::ForwardEuler,
        Scheme::BackwardEuler,
        Scheme::Explicit4Stage,
        Scheme::Explicit38Rule,
        Scheme::Explicit2Stage2ndOrderRunge,
        Scheme::Explicit3Stage3rdOrderHeun,
        Scheme::Explicit3Stage3rdOrder,
        Scheme::Explicit4Stage3rdOrderRunge,
        Scheme::Gauss1Stage2ndOrder,
        Scheme::Gauss2Stage4thOrder,
        Scheme::Gauss3Stage6thOrder,
        Scheme::RadauLeft1Stage1stOrder,
        Scheme::RadauLeft2Stage3rdOrder,
        Scheme::RadauLeft3Stage5thOrder,
        Scheme::RadauRight1Stage1stOrder,
        Scheme::RadauRight2Stage3rdOrder,
        Scheme::RadauRight3Stage5thOrder,
        Scheme::LobattoA2Stage2ndOrder,
        Scheme::LobattoA3Stage4thOrder,
        Scheme::LobattoA4Stage6thOrder,
        Scheme::LobattoB2Stage2ndOrder,
        Scheme::LobattoB3Stage4thOrder,
        Scheme::LobattoB4Stage6thOrder,
        Scheme::LobattoC2Stage2ndOrder,
        Scheme::LobattoC3Stage4thOrder,
        Scheme::LobattoC4Stage6thOrder,
        Scheme::HammerHollingsworth2Stage4thOrder,
        Scheme::KuntzmannButcher3Stage6thOrder,
        Scheme::KuntzmannButcher4Stage8thOrder,
        Scheme::Dirk2Stage3rdOrder,
        Scheme::Sdirk2Stage3rdOrder,
        Scheme::Sdirk5Stage5thOrder,
        Scheme::Sdirk5Stage4thOrder,
        Scheme::Sdirk3Stage4thOrder,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scheme::ForwardEuler => "Forward Euler",
            Scheme::BackwardEuler => "Backward Euler",
            Scheme::Explicit4Stage => "Explicit 4 Stage",
            Scheme::Explicit38Rule => "Explicit 3/8 Rule",
            Scheme::Explicit2Stage2ndOrderRunge => "Explicit 2 Stage 2nd order by Runge",
            Scheme::Explicit3Stage3rdOrderHeun => "Explicit 3 Stage 3rd order by Heun",
            Scheme::Explicit3Stage3rdOrder => "Explicit 3 Stage 3rd order",
            Scheme::Explicit4Stage3rdOrderRunge => "Explicit 4 Stage 3rd order by Runge",
            Scheme::Gauss1Stage2ndOrder => "Implicit 1 Stage 2nd order Gauss",
            Scheme::Gauss2Stage4thOrder => "Implicit 2 Stage 4th order Gauss",
            Scheme::Gauss3Stage6thOrder => "Implicit 3 Stage 6th order Gauss",
            Scheme::RadauLeft1Stage1stOrder => "Implicit 1 Stage 1st order Radau left",
            Scheme::RadauLeft2Stage3rdOrder => "Implicit 2 Stage 3rd order Radau left",
            Scheme::RadauLeft3Stage5thOrder => "Implicit 3 Stage 5th order Radau left",
            Scheme::RadauRight1Stage1stOrder => "Implicit 1 Stage 1st order Radau right",
            Scheme::RadauRight2Stage3rdOrder => "Implicit 2 Stage 3rd order Radau right",
            Scheme::RadauRight3Stage5thOrder => "Implicit 3 Stage 5th order Radau right",
            Scheme::LobattoA2Stage2ndOrder => "Implicit 2 Stage 2nd order Lobatto A",
            Scheme::LobattoA3Stage4thOrder => "Implicit 3 Stage 4th order Lobatto A",
            Scheme::LobattoA4Stage6thOrder => "Implicit 4 Stage 6th order Lobatto A",
            Scheme::LobattoB2Stage2ndOrder => "Implicit 2 Stage 2nd order Lobatto B",
            Scheme::LobattoB3Stage4thOrder => "Implicit 3 Stage 4th order Lobatto B",
            Scheme::LobattoB4Stage6thOrder => "Implicit 4 Stage 6th order Lobatto B",
            Scheme::LobattoC2Stage2ndOrder => "Implicit 2 Stage 2nd order Lobatto C",
            Scheme::LobattoC3Stage4thOrder => "Implicit 3 Stage 4th order Lobatto C",
            Scheme::LobattoC4Stage6thOrder => "Implicit 4 Stage 6th order Lobatto C",
            Scheme::HammerHollingsworth2Stage4thOrder => {
                "Implicit 2 Stage 4th Order Hammer & Hollingsworth"
            }
            Scheme::KuntzmannButcher3Stage6thOrder => {
                "Implicit 3 Stage 6th Order Kuntzmann & Butcher"
            }
            Scheme::KuntzmannButcher4Stage8thOrder => {
                "Implicit 4 Stage 8th Order Kuntzmann & Butcher"
            }
            Scheme::Dirk2Stage3rdOrder => "Diagonal IRK 2 Stage 3rd order",
            Scheme::Sdirk2Stage3rdOrder => "Singly Diagonal IRK 2 Stage 3rd order",
            Scheme::Sdirk5Stage5thOrder => "Singly Diagonal IRK 5 Stage 5th order",
            Scheme::Sdirk5Stage4thOrder => "Singly Diagonal IRK 5 Stage 4th order",
            Scheme::Sdirk3Stage4thOrder => "Singly Diagonal IRK 3 Stage 4th order",
        }
    }

    pub fn from_name(name: &str) -> Option<Scheme> {
        Scheme::ALL.iter().copied().find(|scheme| scheme.name() == name)
    }

    pub fn tableau(self) -> ButcherTableau {
        let (a, b, c, order): (Vec<f64>, Vec<f64>, Vec<f64>, usize) = match self {
            Scheme::ForwardEuler => (vec![0.0], vec![1.0], vec![0.0], 1),
            Scheme::BackwardEuler => (vec![1.0], vec![1.0], vec![1.0], 1),
            Scheme::Explicit4Stage => (
                vec![
                    0.0, 0.0, 0.0, 0.0, //
                    0.5, 0.0, 0.0, 0.0, //
                    0.0, 0.5, 0.0, 0.0, //
                    0.0, 0.0, 1.0, 0.0,
                ],
                vec![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
                vec![0.0, 0.5, 0.5, 1.0],
                4,
            ),
            Scheme::Explicit38Rule => (
                vec![
                    0.0, 0.0, 0.0, 0.0, //
                    1.0 / 3.0, 0.0, 0.0, 0.0, //
                    -1.0 / 3.0, 1.0, 0.0, 0.0, //
                    1.0, -1.0, 1.0, 0.0,
                ],
                vec![1.0 / 8.0, 3.0 / 8.0, 3.0 / 8.0, 1.0 / 8.0],
                vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0],
                4,
            ),
            Scheme::Explicit2Stage2ndOrderRunge => (
                vec![0.0, 0.0, 0.5, 0.0],
                vec![0.0, 1.0],
                vec![0.0, 0.5],
                2,
            ),
            Scheme::Explicit3Stage3rdOrderHeun => (
                vec![
                    0.0, 0.0, 0.0, //
                    1.0 / 3.0, 0.0, 0.0, //
                    0.0, 2.0 / 3.0, 0.0,
                ],
                vec![0.25, 0.0, 0.75],
                vec![0.0, 1.0 / 3.0, 2.0 / 3.0],
                3,
            ),
            Scheme::Explicit3Stage3rdOrder => (
                vec![
                    0.0, 0.0, 0.0, //
                    0.5, 0.0, 0.0, //
                    -1.0, 2.0, 0.0,
                ],
                vec![1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0],
                vec![0.0, 0.5, 1.0],
                3,
            ),
            Scheme::Explicit4Stage3rdOrderRunge => (
                vec![
                    0.0, 0.0, 0.0, 0.0, //
                    0.5, 0.0, 0.0, 0.0, //
                    0.0, 1.0, 0.0, 0.0, //
                    0.0, 0.0, 1.0, 0.0,
                ],
                vec![1.0 / 6.0, 2.0 / 3.0, 0.0, 1.0 / 6.0],
                vec![0.0, 0.5, 1.0, 1.0],
                3,
            ),
            Scheme::Gauss1Stage2ndOrder => (vec![0.5], vec![1.0], vec![0.5], 2),
            Scheme::Gauss2Stage4thOrder | Scheme::HammerHollingsworth2Stage4thOrder => {
                let r = 3.0_f64.sqrt() / 6.0;
                (
                    vec![0.25, 0.25 - r, 0.25 + r, 0.25],
                    vec![0.5, 0.5],
                    vec![0.5 - r, 0.5 + r],
                    4,
                )
            }
            Scheme::Gauss3Stage6thOrder | Scheme::KuntzmannButcher3Stage6thOrder => {
                let s = 15.0_f64.sqrt();
                (
                    vec![
                        5.0 / 36.0,
                        2.0 / 9.0 - s / 15.0,
                        5.0 / 36.0 - s / 30.0,
                        5.0 / 36.0 + s / 24.0,
                        2.0 / 9.0,
                        5.0 / 36.0 - s / 24.0,
                        5.0 / 36.0 + s / 30.0,
                        2.0 / 9.0 + s / 15.0,
                        5.0 / 36.0,
                    ],
                    vec![5.0 / 18.0, 4.0 / 9.0, 5.0 / 18.0],
                    vec![0.5 - s / 10.0, 0.5, 0.5 + s / 10.0],
                    6,
                )
            }
            Scheme::KuntzmannButcher4Stage8thOrder => kuntzmann_butcher_4_stage(),
            Scheme::RadauLeft1Stage1stOrder => (vec![1.0], vec![1.0], vec![0.0], 1),
            Scheme::RadauLeft2Stage3rdOrder => (
                vec![0.25, -0.25, 0.25, 5.0 / 12.0],
                vec![0.25, 0.75],
                vec![0.0, 2.0 / 3.0],
                3,
            ),
            Scheme::RadauLeft3Stage5thOrder => {
                let r = 6.0_f64.sqrt();
                (
                    vec![
                        1.0 / 9.0,
                        (-1.0 - r) / 18.0,
                        (-1.0 + r) / 18.0,
                        1.0 / 9.0,
                        (88.0 + 7.0 * r) / 360.0,
                        (88.0 - 43.0 * r) / 360.0,
                        1.0 / 9.0,
                        (88.0 + 43.0 * r) / 360.0,
                        (88.0 - 7.0 * r) / 360.0,
                    ],
                    vec![1.0 / 9.0, (16.0 + r) / 36.0, (16.0 - r) / 36.0],
                    vec![0.0, (6.0 - r) / 10.0, (6.0 + r) / 10.0],
                    5,
                )
            }
            Scheme::RadauRight1Stage1stOrder => (vec![1.0], vec![1.0], vec![1.0], 1),
            Scheme::RadauRight2Stage3rdOrder => (
                vec![5.0 / 12.0, -1.0 / 12.0, 0.75, 0.25],
                vec![0.75, 0.25],
                vec![1.0 / 3.0, 1.0],
                3,
            ),
            Scheme::RadauRight3Stage5thOrder => {
                let r = 6.0_f64.sqrt();
                (
                    vec![
                        (88.0 - 7.0 * r) / 360.0,
                        (296.0 - 169.0 * r) / 1800.0,
                        (-2.0 + 3.0 * r) / 225.0,
                        (296.0 + 169.0 * r) / 1800.0,
                        (88.0 + 7.0 * r) / 360.0,
                        (-2.0 - 3.0 * r) / 225.0,
                        (16.0 - r) / 36.0,
                        (16.0 + r) / 36.0,
                        1.0 / 9.0,
                    ],
                    vec![(16.0 - r) / 36.0, (16.0 + r) / 36.0, 1.0 / 9.0],
                    vec![(4.0 - r) / 10.0, (4.0 + r) / 10.0, 1.0],
                    5,
                )
            }
            Scheme::LobattoA2Stage2ndOrder => (
                vec![0.0, 0.0, 0.5, 0.5],
                vec![0.5, 0.5],
                vec![0.0, 1.0],
                2,
            ),
            Scheme::LobattoA3Stage4thOrder => (
                vec![
                    0.0, 0.0, 0.0, //
                    5.0 / 24.0, 1.0 / 3.0, -1.0 / 24.0, //
                    1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0,
                ],
                vec![1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
                vec![0.0, 0.5, 1.0],
                4,
            ),
            Scheme::LobattoA4Stage6thOrder => {
                let q = 5.0_f64.sqrt();
                (
                    vec![
                        0.0,
                        0.0,
                        0.0,
                        0.0,
                        (11.0 + q) / 120.0,
                        (25.0 - q) / 120.0,
                        (25.0 - 13.0 * q) / 120.0,
                        (-1.0 + q) / 120.0,
                        (11.0 - q) / 120.0,
                        (25.0 + 13.0 * q) / 120.0,
                        (25.0 + q) / 120.0,
                        (-1.0 - q) / 120.0,
                        1.0 / 12.0,
                        5.0 / 12.0,
                        5.0 / 12.0,
                        1.0 / 12.0,
                    ],
                    vec![1.0 / 12.0, 5.0 / 12.0, 5.0 / 12.0, 1.0 / 12.0],
                    vec![0.0, (5.0 - q) / 10.0, (5.0 + q) / 10.0, 1.0],
                    6,
                )
            }
            Scheme::LobattoB2Stage2ndOrder => (
                vec![0.5, 0.0, 0.5, 0.0],
                vec![0.5, 0.5],
                vec![0.0, 1.0],
                2,
            ),
            Scheme::LobattoB3Stage4thOrder => (
                vec![
                    1.0 / 6.0, -1.0 / 6.0, 0.0, //
                    1.0 / 6.0, 1.0 / 3.0, 0.0, //
                    1.0 / 6.0, 5.0 / 6.0, 0.0,
                ],
                vec![1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
                vec![0.0, 0.5, 1.0],
                4,
            ),
            Scheme::LobattoB4Stage6thOrder => {
                let q = 5.0_f64.sqrt();
                (
                    vec![
                        1.0 / 12.0,
                        (-1.0 - q) / 24.0,
                        (-1.0 + q) / 24.0,
                        0.0,
                        1.0 / 12.0,
                        (25.0 + q) / 120.0,
                        (25.0 - 13.0 * q) / 120.0,
                        0.0,
                        1.0 / 12.0,
                        (25.0 + 13.0 * q) / 120.0,
                        (25.0 - q) / 120.0,
                        0.0,
                        1.0 / 12.0,
                        (11.0 - q) / 24.0,
                        (11.0 + q) / 24.0,
                        0.0,
                    ],
                    vec![1.0 / 12.0, 5.0 / 12.0, 5.0 / 12.0, 1.0 / 12.0],
                    vec![0.0, (5.0 - q) / 10.0, (5.0 + q) / 10.0, 1.0],
                    6,
                )
            }
            Scheme::LobattoC2Stage2ndOrder => (
                vec![0.5, -0.5, 0.5, 0.5],
                vec![0.5, 0.5],
                vec![0.0, 1.0],
                2,
            ),
            Scheme::LobattoC3Stage4thOrder => (
                vec![
                    1.0 / 6.0, -1.0 / 3.0, 1.0 / 6.0, //
                    1.0 / 6.0, 5.0 / 12.0, -1.0 / 12.0, //
                    1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0,
                ],
                vec![1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
                vec![0.0, 0.5, 1.0],
                4,
            ),
            Scheme::LobattoC4Stage6thOrder => {
                let q = 5.0_f64.sqrt();
                (
                    vec![
                        1.0 / 12.0,
                        -q / 12.0,
                        q / 12.0,
                        -1.0 / 12.0,
                        1.0 / 12.0,
                        0.25,
                        (10.0 - 7.0 * q) / 60.0,
                        q / 60.0,
                        1.0 / 12.0,
                        (10.0 + 7.0 * q) / 60.0,
                        0.25,
                        -q / 60.0,
                        1.0 / 12.0,
                        5.0 / 12.0,
                        5.0 / 12.0,
                        1.0 / 12.0,
                    ],
                    vec![1.0 / 12.0, 5.0 / 12.0, 5.0 / 12.0, 1.0 / 12.0],
                    vec![0.0, (5.0 - q) / 10.0, (5.0 + q) / 10.0, 1.0],
                    6,
                )
            }
            Scheme::Dirk2Stage3rdOrder => (
                vec![0.0, 0.0, 1.0 / 3.0, 1.0 / 3.0],
                vec![0.25, 0.75],
                vec![0.0, 2.0 / 3.0],
                3,
            ),
            Scheme::Sdirk2Stage3rdOrder => {
                let gamma = (3.0 + 3.0_f64.sqrt()) / 6.0;
                (
                    vec![gamma, 0.0, 1.0 - 2.0 * gamma, gamma],
                    vec![0.5, 0.5],
                    vec![gamma, 1.0 - gamma],
                    3,
                )
            }
            Scheme::Sdirk5Stage5thOrder => {
                let r = 6.0_f64.sqrt();
                let gamma = (6.0 - r) / 10.0;
                (
                    vec![
                        gamma,
                        0.0,
                        0.0,
                        0.0,
                        0.0,
                        (-6.0 + 5.0 * r) / 14.0,
                        gamma,
                        0.0,
                        0.0,
                        0.0,
                        (888.0 + 607.0 * r) / 2850.0,
                        (126.0 - 161.0 * r) / 1425.0,
                        gamma,
                        0.0,
                        0.0,
                        (3153.0 - 3082.0 * r) / 14250.0,
                        (3213.0 + 1148.0 * r) / 28500.0,
                        (-267.0 + 88.0 * r) / 500.0,
                        gamma,
                        0.0,
                        (-32583.0 + 14638.0 * r) / 71250.0,
                        (-17199.0 + 364.0 * r) / 142500.0,
                        (1329.0 - 544.0 * r) / 2500.0,
                        (-96.0 + 131.0 * r) / 625.0,
                        gamma,
                    ],
                    vec![0.0, 0.0, 1.0 / 9.0, (16.0 - r) / 36.0, (16.0 + r) / 36.0],
                    vec![
                        gamma,
                        (6.0 + 9.0 * r) / 35.0,
                        1.0,
                        (4.0 - r) / 10.0,
                        (4.0 + r) / 10.0,
                    ],
                    5,
                )
            }
            Scheme::Sdirk5Stage4thOrder => (
                vec![
                    0.25, 0.0, 0.0, 0.0, 0.0, //
                    0.5, 0.25, 0.0, 0.0, 0.0, //
                    17.0 / 50.0, -1.0 / 25.0, 0.25, 0.0, 0.0, //
                    371.0 / 1360.0, -137.0 / 2720.0, 15.0 / 544.0, 0.25, 0.0, //
                    25.0 / 24.0, -49.0 / 48.0, 125.0 / 16.0, -85.0 / 12.0, 0.25,
                ],
                vec![25.0 / 24.0, -49.0 / 48.0, 125.0 / 16.0, -85.0 / 12.0, 0.25],
                vec![0.25, 0.75, 11.0 / 20.0, 0.5, 1.0],
                4,
            ),
            Scheme::Sdirk3Stage4thOrder => {
                let gamma = (std::f64::consts::PI / 18.0).cos() / 3.0_f64.sqrt() + 0.5;
                let delta = 1.0 / (6.0 * (2.0 * gamma - 1.0).powi(2));
                (
                    vec![
                        gamma,
                        0.0,
                        0.0,
                        0.5 - gamma,
                        gamma,
                        0.0,
                        2.0 * gamma,
                        1.0 - 4.0 * gamma,
                        gamma,
                    ],
                    vec![delta, 1.0 - 2.0 * delta, delta],
                    vec![gamma, 0.5, 1.0 - gamma],
                    4,
                )
            }
        };

        let s = b.len();
        ButcherTableau {
            a: DMatrix::from_row_slice(s, s, &a),
            b: DVector::from_vec(b),
            c: DVector::from_vec(c),
            order,
            description: self.name().to_string(),
        }
    }
}

/// Fourth Gauss method (order 8), written through the auxiliary `w`
/// constants of the Kuntzmann-Butcher construction.
fn kuntzmann_butcher_4_stage() -> (Vec<f64>, Vec<f64>, Vec<f64>, usize) {
    let r30 = 30.0_f64.sqrt();
    let w1 = 1.0 / 8.0 - r30 / 144.0;
    let w2 = 0.5 * ((15.0 + 2.0 * r30) / 35.0).sqrt();
    let w3 = w2 * (1.0 / 6.0 + r30 / 24.0);
    let w4 = w2 * (1.0 / 21.0 + 5.0 * r30 / 168.0);
    let w5 = w2 - 2.0 * w3;
    let w1p = 1.0 / 8.0 + r30 / 144.0;
    let w2p = 0.5 * ((15.0 - 2.0 * r30) / 35.0).sqrt();
    let w3p = w2p * (1.0 / 6.0 - r30 / 24.0);
    let w4p = w2p * (1.0 / 21.0 - 5.0 * r30 / 168.0);
    let w5p = w2p - 2.0 * w3p;

    let a = vec![
        w1,
        w1p - w3 + w4p,
        w1p - w3 - w4p,
        w1 - w5,
        w1 - w3p + w4,
        w1p,
        w1p - w5p,
        w1 - w3p - w4,
        w1 + w3p + w4,
        w1p + w5p,
        w1p,
        w1 + w3p - w4,
        w1 + w5,
        w1p + w3 + w4p,
        w1p + w3 - w4p,
        w1,
    ];
    let b = vec![2.0 * w1, 2.0 * w1p, 2.0 * w1p, 2.0 * w1];
    let c = vec![0.5 - w2, 0.5 - w2p, 0.5 + w2p, 0.5 + w2];
    (a, b, c, 8)
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Scheme::from_name(s).ok_or_else(|| Error::UnknownScheme(s.to_string()))
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable name -> tableau table, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct TableauRegistry {
    entries: HashMap<&'static str, ButcherTableau>,
}

impl TableauRegistry {
    pub fn new() -> Self {
        let entries = Scheme::ALL
            .iter()
            .map(|scheme| (scheme.name(), scheme.tableau()))
            .collect();
        Self { entries }
    }

    pub fn create(&self, name: &str) -> Result<ButcherTableau> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownScheme(name.to_string()))
    }

    pub fn get(&self, scheme: Scheme) -> &ButcherTableau {
        // Every scheme is inserted by `new`.
        &self.entries[scheme.name()]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        Scheme::ALL.iter().map(|scheme| scheme.name())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TableauRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tableau::RkType;
    use approx::assert_relative_eq;

    #[test]
    fn gauss_two_stage_lookup() {
        let registry = TableauRegistry::new();
        let tableau = registry
            .create("Implicit 2 Stage 4th order Gauss")
            .expect("registered");
        assert_eq!(tableau.num_stages(), 2);
        assert_eq!(tableau.order(), 4);
        assert_eq!(tableau.classify(), RkType::Irk);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let registry = TableauRegistry::new();
        let err = registry.create("Explicit 9 Stage").expect_err("unknown");
        assert!(matches!(err, Error::UnknownScheme(ref name) if name == "Explicit 9 Stage"));
        assert!("forward euler".parse::<Scheme>().is_err());
    }

    #[test]
    fn every_name_round_trips() {
        let registry = TableauRegistry::new();
        assert_eq!(registry.len(), Scheme::ALL.len());
        for scheme in Scheme::ALL {
            assert_eq!(scheme.name().parse::<Scheme>().expect("parse"), scheme);
            let tableau = registry.create(scheme.name()).expect("registered");
            assert_eq!(&tableau, registry.get(scheme));
            assert_eq!(tableau.description(), scheme.name());
        }
    }

    #[test]
    fn shapes_are_consistent() {
        for scheme in Scheme::ALL {
            let tableau = scheme.tableau();
            let s = tableau.num_stages();
            assert!(s >= 1, "{scheme}");
            assert_eq!(tableau.a().shape(), (s, s), "{scheme}");
            assert_eq!(tableau.c().len(), s, "{scheme}");
            assert!(!tableau.is_empty(), "{scheme}");
            assert_relative_eq!(tableau.b().sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn schemes_satisfy_order_conditions() {
        for scheme in Scheme::ALL {
            let tableau = scheme.tableau();
            assert!(
                tableau.satisfies_order_conditions(tableau.order().min(3), 1e-10),
                "{scheme} fails its order conditions"
            );
        }
    }

    #[test]
    fn families_classify_as_expected() {
        let expect = |scheme: Scheme, kind: RkType| {
            assert_eq!(scheme.tableau().classify(), kind, "{scheme}");
        };
        expect(Scheme::ForwardEuler, RkType::Erk);
        expect(Scheme::Explicit4Stage, RkType::Erk);
        expect(Scheme::Explicit38Rule, RkType::Erk);
        expect(Scheme::Explicit4Stage3rdOrderRunge, RkType::Erk);
        expect(Scheme::BackwardEuler, RkType::Irk);
        expect(Scheme::Gauss1Stage2ndOrder, RkType::Irk);
        expect(Scheme::RadauLeft1Stage1stOrder, RkType::Irk);
        expect(Scheme::Gauss3Stage6thOrder, RkType::Irk);
        expect(Scheme::RadauRight3Stage5thOrder, RkType::Irk);
        expect(Scheme::LobattoA2Stage2ndOrder, RkType::Dirk);
        expect(Scheme::LobattoB2Stage2ndOrder, RkType::Dirk);
        expect(Scheme::LobattoC2Stage2ndOrder, RkType::Irk);
        expect(Scheme::Dirk2Stage3rdOrder, RkType::Dirk);
        expect(Scheme::Sdirk2Stage3rdOrder, RkType::Sdirk);
        expect(Scheme::Sdirk3Stage4thOrder, RkType::Sdirk);
        expect(Scheme::Sdirk5Stage4thOrder, RkType::Sdirk);
        expect(Scheme::Sdirk5Stage5thOrder, RkType::Sdirk);
    }

    #[test]
    fn aliases_share_coefficients() {
        assert_eq!(
            Scheme::Gauss2Stage4thOrder.tableau(),
            Scheme::HammerHollingsworth2Stage4thOrder.tableau()
        );
        assert_eq!(
            Scheme::Gauss3Stage6thOrder.tableau(),
            Scheme::KuntzmannButcher3Stage6thOrder.tableau()
        );
    }

    #[test]
    fn kuntzmann_butcher_nodes_are_symmetric() {
        let tableau = Scheme::KuntzmannButcher4Stage8thOrder.tableau();
        let c = tableau.c();
        assert_relative_eq!(c[0] + c[3], 1.0, epsilon = 1e-14);
        assert_relative_eq!(c[1] + c[2], 1.0, epsilon = 1e-14);
        // Row sums reproduce the nodes for collocation methods.
        for i in 0..4 {
            assert_relative_eq!(tableau.a().row(i).sum(), c[i], epsilon = 1e-12);
        }
    }
}
