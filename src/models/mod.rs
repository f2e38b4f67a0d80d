// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod actor;
pub mod job;
pub mod subscription;

pub use actor::{Actor, ActorKind};
pub use job::{Bookmark, BookmarkTarget, JobApplication, JobPosting};
pub use subscription::{SubscriptionSnapshot, SubscriptionStatus};
