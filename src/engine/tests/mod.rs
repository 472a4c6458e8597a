use super::*;
use crate::engine::test_helpers::*;
use crate::error::{Error, ProviderError, ValidationError};
use crate::types::{GenerationParams, SubmitRequest, TaskRecord, TaskStatus, error_codes};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
