/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! a central place to intercept logging macros, copied from odin_actor's own `trace!`/
//! `debug!`/`info!`/`warn!`/`error!` forwarding macros rather than depending on odin_actor
//! itself (that crate's actor runtime needs nightly `trait_alias`, which this binary has no
//! other use for).

#[macro_export]
macro_rules! trace {
    ( $( $id:ident = $e:expr ),* ) => { tracing::trace!( $( $id = $e ),* ) };
    ( $( $e: expr ),* ) => { tracing::trace!( $( $e ),* ) }
}

#[macro_export]
macro_rules! debug {
    ( $( $id:ident = $e:expr ),* ) => { tracing::debug!( $( $id = $e ),* ) };
    ( $( $e: expr ),* ) => { tracing::debug!( $( $e ),* ) }
}

#[macro_export]
macro_rules! info {
    ( $( $id:ident = $e:expr ),* ) => { tracing::info!( $( $id = $e ),* ) };
    ( $( $e: expr ),* ) => { tracing::info!( $( $e ),* ) }
}

#[macro_export]
macro_rules! warn {
    ( $( $id:ident = $e:expr ),* ) => { tracing::warn!( $( $id = $e ),* ) };
    ( $( $e: expr ),* ) => { tracing::warn!( $( $e ),* ) }
}

#[macro_export]
macro_rules! error {
    ( $( $id:ident = $e:expr ),* ) => { tracing::error!( $( $id = $e ),* ) };
    ( $( $e: expr ),* ) => { tracing::error!( $( $e ),* ) }
}

pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
