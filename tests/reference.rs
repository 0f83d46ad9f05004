// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Check our special functions against high-precision reference values.

extern crate regex;
extern crate synchroflux;

use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use synchroflux::bessel::{bessel_k, synchrotron_g1};
use synchroflux::integrate::IntegrationWorkspace;

const TOP: &'static str = env!("CARGO_MANIFEST_DIR");

fn reference_rows() -> Vec<Vec<f64>> {
    let comment = Regex::new(r"^\s*(#.*)?$").unwrap();
    let sep = Regex::new(r"\s+").unwrap();

    let mut p = PathBuf::from(TOP);
    p.push("tests");
    p.push("synchrotron-reference.txt");

    let f = BufReader::new(File::open(p).unwrap());
    let mut rows = Vec::new();

    for line in f.lines() {
        let line = line.unwrap();

        if comment.is_match(&line) {
            continue;
        }

        rows.push(sep.split(line.trim()).map(|s| s.parse::<f64>().unwrap()).collect());
    }

    rows
}

fn check_column(name: &str, index: usize, rtol: f64, f: &dyn Fn(f64, &mut IntegrationWorkspace) -> f64) {
    let mut ws = IntegrationWorkspace::new(1000);
    let rows = reference_rows();
    assert!(rows.len() >= 8);

    for row in rows {
        let y = row[0];
        let ours = f(y, &mut ws);
        let theirs = row[index];
        let rel_err = ((ours - theirs) / theirs).abs();

        if rel_err > rtol {
            panic!("disagree with reference {} at y = {:e}: expected {:.15e}, got {:.15e}",
                   name, y, theirs, ours);
        }
    }
}

#[test]
fn g1_matches_reference() {
    check_column("G1", 1, 1e-8, &|y, ws| synchrotron_g1(y, ws).unwrap());
}

#[test]
fn k13_matches_reference() {
    check_column("K_1/3", 2, 1e-8, &|y, ws| bessel_k(1. / 3., y, ws).unwrap());
}

#[test]
fn k23_matches_reference() {
    check_column("K_2/3", 3, 1e-8, &|y, ws| bessel_k(2. / 3., y, ws).unwrap());
}
