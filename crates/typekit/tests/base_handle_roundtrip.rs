// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Round-trip identity through the base trait, plus argument-taking
//! construction.
//!
//! An object built by name and handed back as a base handle must behave,
//! through every base-defined operation, identically to one of the
//! concrete type constructed directly.

use std::f64::consts::PI;
use std::mem::MaybeUninit;

use typekit::{ConstructError, DescriptorBuilder, FromArgs, LocalRegistry, Registry};

trait Shape {
    fn area(&self) -> f64;
    fn describe(&self) -> String;
    fn scale(&mut self, factor: f64);
}
typekit::impl_base!(Shape);

#[derive(Default)]
struct Square {
    side: f64,
}
impl Shape for Square {
    fn area(&self) -> f64 {
        self.side * self.side
    }
    fn describe(&self) -> String {
        format!("Square({})", self.side)
    }
    fn scale(&mut self, factor: f64) {
        self.side *= factor;
    }
}
impl FromArgs<(f64,)> for Square {
    fn from_args((side,): (f64,)) -> Self {
        Self { side }
    }
}

#[derive(Default)]
struct Circle {
    radius: f64,
}
impl Shape for Circle {
    fn area(&self) -> f64 {
        PI * self.radius * self.radius
    }
    fn describe(&self) -> String {
        format!("Circle({})", self.radius)
    }
    fn scale(&mut self, factor: f64) {
        self.radius *= factor;
    }
}
impl FromArgs<(f64,)> for Circle {
    fn from_args((radius,): (f64,)) -> Self {
        Self { radius }
    }
}

#[test]
fn test_roundtrip_matches_direct_construction() {
    let registry: Registry<dyn Shape> = Registry::new();
    registry.register::<Square>("square");

    let mut via_registry = registry
        .alloc_and_construct("square")
        .expect("registered");
    let mut direct = Square::default();

    assert_eq!(via_registry.area(), direct.area());
    assert_eq!(via_registry.describe(), direct.describe());

    via_registry.scale(3.0);
    direct.scale(3.0);
    assert_eq!(via_registry.area(), direct.area());
    assert_eq!(via_registry.describe(), direct.describe());
}

#[test]
fn test_placement_roundtrip_matches_heap() {
    let registry: Registry<dyn Shape> = Registry::new();
    registry.register::<Circle>("circle");

    let heap = registry.alloc_and_construct("circle").expect("registered");

    let mut storage = [MaybeUninit::<u8>::uninit(); 32];
    let placed = registry
        .construct_in("circle", &mut storage)
        .expect("fits");

    assert_eq!(heap.area(), placed.area());
    assert_eq!(heap.describe(), placed.describe());
}

#[test]
fn test_args_construction() {
    let registry: Registry<dyn Shape, (f64,)> = Registry::new();
    registry.register_type(
        DescriptorBuilder::<Square, dyn Shape, (f64,)>::new("square")
            .default_constructible()
            .constructible_with_args()
            .build(),
    );
    registry.register_type(
        DescriptorBuilder::<Circle, dyn Shape, (f64,)>::new("circle")
            .constructible_with_args()
            .build(),
    );

    let square = registry
        .alloc_and_construct_with("square", (4.0,))
        .expect("args path");
    assert_eq!(square.area(), 16.0);

    let circle = registry
        .alloc_and_construct_with("circle", (2.0,))
        .expect("args path");
    assert!((circle.area() - PI * 4.0).abs() < 1e-12);

    // The default path is still available where declared, and a checked
    // failure where not.
    assert_eq!(registry.alloc_and_construct("square").unwrap().area(), 0.0);
    assert!(matches!(
        registry.alloc_and_construct("circle"),
        Err(ConstructError::NotDefaultConstructible { .. })
    ));
}

#[test]
fn test_args_placement_construction() {
    let registry: Registry<dyn Shape, (f64,)> = Registry::new();
    registry.register_type(
        DescriptorBuilder::<Circle, dyn Shape, (f64,)>::new("circle")
            .constructible_with_args()
            .build(),
    );

    let mut storage = [MaybeUninit::<u8>::uninit(); 32];
    let circle = registry
        .construct_in_with("circle", &mut storage, (1.0,))
        .expect("fits");
    assert!((circle.area() - PI).abs() < 1e-12);

    // The default placement path on an args-only descriptor is a
    // checked failure.
    let mut storage = [MaybeUninit::<u8>::uninit(); 32];
    assert!(matches!(
        registry.construct_in("circle", &mut storage),
        Err(ConstructError::NotDefaultConstructible { .. })
    ));
}

#[test]
fn test_args_missing_is_checked() {
    let registry: Registry<dyn Shape, (f64,)> = Registry::new();
    registry.register_type(
        DescriptorBuilder::<Square, dyn Shape, (f64,)>::new("square")
            .default_constructible()
            .build(),
    );

    assert!(matches!(
        registry.alloc_and_construct_with("square", (4.0,)),
        Err(ConstructError::NotConstructible { .. })
    ));
}

#[test]
fn test_local_registry_roundtrip() {
    let registry: LocalRegistry<dyn Shape> = LocalRegistry::new();
    registry.register::<Circle>("circle");
    registry.register::<Square>("square");

    assert_eq!(registry.type_names().len(), 2);

    let shape = registry.alloc_and_construct("circle").expect("registered");
    assert_eq!(shape.area(), 0.0);
    assert_eq!(shape.describe(), "Circle(0)");
}
