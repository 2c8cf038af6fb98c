/*!
# Merchant Partnership Questionnaire

A branching questionnaire web service for merchant partner feedback, built
in Rust.

## Overview

The service runs a multi-step wizard that adapts its questions to the
respondent: potential partners get the cooperation-intention question set,
existing partners get the satisfaction question set. Completed records are
stored, mirrored into a spreadsheet workbook, and browsable through a small
role-based admin panel.

## Architecture

The application follows a client-server architecture:

### Frontend Layer
- **Technologies**: Plain HTML/JS pages served by the backend
- **Key Components**:
  - Wizard page - Renders the step the server hands out, step by step
  - Login page - Admin-panel authentication
  - Admin page - Submission table and account management

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Flow Controller - Computes the next/previous step from the answers
    accumulated so far; single source of branching truth
  - Validation - Per-step and whole-record checks (regexes, rating ranges,
    branch invariants)
  - Response Store - In-memory submission storage behind a trait
  - Auth Layer - Session-cookie login, argon2 password hashes, role
    hierarchy (viewer < editor < admin)
  - Spreadsheet Mirror - Appends a formatted row per submission to a
    workbook, off the request path

### Data Persistence Layer
- Snapshot persistence with Gzip compression and bincode serialization
- Mirrored `.xlsx` workbook with a JSON row sidecar

## Modules

- **flow**: Wizard finite-state flow (steps, branching, progress)
- **response**: Submission record, branch discriminator, validation
- **storage**: Response store trait and in-memory implementation
- **saving**: Snapshot persistence with compression
- **auth**: Accounts, roles, sessions, and the auth handlers
- **sheets**: Spreadsheet mirroring
- **config**: Environment-based configuration
- **app**: Routing, middleware, and server startup

## REST API Endpoints

- `POST /api/flow/advance` - Computes the next wizard step from the answers
- `POST /api/responses` - Validates and stores a completed questionnaire
- `POST /api/auth/login`, `POST /api/auth/logout`, `GET /api/auth/me`
- `GET /api/admin/responses` - All submissions (viewer and above)
- `GET /api/admin/users` and friends - Account management (admin only)
*/

// Re-export all modules so they appear in the documentation
pub mod flow;
pub mod response;
pub mod saving;
pub mod storage;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod auth;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod sheets;

/// Re-export everything from these modules to make it easier to use
pub use flow::*;
pub use response::*;
pub use saving::*;
pub use storage::*;
