// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent team coordination: a file-backed task board, a per-agent message
//! bus, a teammate scheduler, and the shutdown/plan-approval handshake.

mod bus;
mod error;
mod fsutil;
mod shutdown;
mod task_board;
mod teammate;
mod tools;

pub use bus::{InboxMessage, MessageBus, MessageType, NamedInbox};
pub use error::{BusError, TaskBoardError, TeamError};
pub use shutdown::{PendingEntry, PendingKind, PendingRequests, PendingStatus};
pub use task_board::{Task, TaskBoard, TaskStatus};
pub use teammate::{TeamRegistry, Teammate, TeammateRecord, TeammateStatus};
pub use tools::{
    BroadcastTool, ClaimTaskTool, FilePlanTool, IdleTool, ListTeammatesTool, PlanApprovalTool, ReadInboxTool,
    SendMessageTool, ShutdownRequestTool, SpawnTeammateTool, TaskCreateTool, TaskGetTool, TaskListTool,
    TaskUpdateTool, TeammateFactory,
};
