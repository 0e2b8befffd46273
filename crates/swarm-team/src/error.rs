// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskBoardError {
    #[error("no task with id {0}")]
    NotFound(u64),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt task file: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed inbox line skipped: {0}")]
    MalformedLine(String),
}

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("teammate '{0}' is already working")]
    AlreadyWorking(String),
    #[error("no teammate named '{0}'")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
