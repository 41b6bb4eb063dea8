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

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OdinFirecamError>;

/// odin_firecam specific error type, following the same flat-variant-plus-opaque-mapping
/// convention as odin_sentinel::errors::OdinSentinelError.
#[derive(Error, Debug)]
pub enum OdinFirecamError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("store error: {0}")]
    StoreError(#[from] sqlx::Error),

    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    RonError(String),

    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("subprocess failed: {0}")]
    SubprocessError(String),

    #[error("no such camera: {0}")]
    NoSuchCamera(String),

    #[error("classifier error: {0}")]
    ClassifierError(String),

    #[error("operation failed: {0}")]
    OpFailed(String),
}

impl From<ron::de::SpannedError> for OdinFirecamError {
    fn from(e: ron::de::SpannedError) -> Self { OdinFirecamError::RonError(e.to_string()) }
}

impl From<ron::Error> for OdinFirecamError {
    fn from(e: ron::Error) -> Self { OdinFirecamError::RonError(e.to_string()) }
}

pub fn op_failed(msg: impl ToString) -> OdinFirecamError {
    OdinFirecamError::OpFailed(msg.to_string())
}

pub fn config_error(msg: impl ToString) -> OdinFirecamError {
    OdinFirecamError::ConfigError(msg.to_string())
}

pub fn classifier_error(msg: impl ToString) -> OdinFirecamError {
    OdinFirecamError::ClassifierError(msg.to_string())
}
