//! Simple REST API server example for the marketplace core.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /checkout` - Calculate fees and record the commission
//! - `GET /fees/{user_id}` - Quote fees for a user without recording
//! - `GET /analytics` - Platform fee analytics
//! - `POST /messages` - Send a chat message (filtered and moderated)
//! - `GET /rooms/{user_id}` - List a user's chat rooms
//! - `GET /rooms/{room_id}/messages` - List a room's messages
//! - `POST /reads` - Mark a room's messages as read
//! - `POST /reports` - Report a message
//! - `POST /blocks` - Block a user
//!
//! ## Example Usage
//!
//! ```bash
//! # Checkout a $100.00 rental with a $50.00 deposit
//! curl -X POST http://localhost:3000/checkout \
//!   -H "Content-Type: application/json" \
//!   -d '{"user_id": 1, "item_id": "item-1", "item_title": "Bounce house", "owner_name": "Dana", "rental_amount": 10000, "security_deposit": 5000, "payment_id": "pay-1"}'
//!
//! # Send a message
//! curl -X POST http://localhost:3000/messages \
//!   -H "Content-Type: application/json" \
//!   -d '{"sender_id": 1, "receiver_id": 2, "content": "Is the tent free Saturday?"}'
//!
//! # Admin analytics
//! curl http://localhost:3000/analytics
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use rentmarket::{
    AffiliateId, AffiliateInfo, AffiliateTier, ChatEngine, ChatMessage, CommissionInput,
    CommissionLedger, ErrorKind, FeeEngine, MarketError, MessageId, RoomId, UserChatProfile,
    UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for recording a successful checkout.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: u64,
    pub payment_id: String,
    pub item_id: String,
    pub item_title: String,
    pub owner_name: String,
    pub rental_amount: i64,
    #[serde(default)]
    pub security_deposit: i64,
    pub affiliate: Option<AffiliateRequest>,
}

#[derive(Debug, Deserialize)]
pub struct AffiliateRequest {
    pub affiliate_id: u64,
    pub affiliate_name: String,
    pub tier: AffiliateTier,
    pub referral_code: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub record_id: u64,
    pub platform_fee: i64,
    pub owner_payout: i64,
    pub total_with_fees: i64,
}

/// Request body for sending a chat message.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub sender_id: u64,
    pub receiver_id: u64,
    pub content: String,
    pub room_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    pub room_id: u64,
    pub user_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub message_id: u64,
    pub reporter_id: u64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub blocker_id: u64,
    pub blocked_id: u64,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

// === Application State ===

/// Shared application state containing the marketplace engines.
#[derive(Clone)]
pub struct AppState {
    pub fees: Arc<FeeEngine>,
    pub ledger: Arc<CommissionLedger>,
    pub chat: Arc<ChatEngine>,
}

// === Error Handling ===

/// Wrapper for converting `MarketError` into HTTP responses.
pub struct AppError(MarketError);

impl From<MarketError> for AppError {
    fn from(err: MarketError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match self.0.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ErrorKind::Transient => (StatusCode::SERVICE_UNAVAILABLE, "TRANSIENT"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                kind: kind.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /checkout - Calculate fees and record the commission.
async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let user_id = UserId(request.user_id);
    let structure = state.fees.user_fee_structure(user_id);
    let calculation =
        state
            .fees
            .calculate_fees(user_id, request.rental_amount, request.security_deposit)?;

    let affiliate = request.affiliate.map(|a| AffiliateInfo {
        affiliate_id: AffiliateId(a.affiliate_id),
        affiliate_name: a.affiliate_name,
        tier: a.tier,
        referral_code: a.referral_code,
    });

    let record = state.ledger.record(
        CommissionInput {
            payment_id: request.payment_id,
            item_id: request.item_id,
            item_title: request.item_title,
            rental_amount: calculation.rental_amount,
            commission: calculation.platform_fee,
            owner_payout: calculation.owner_payout,
            owner_name: request.owner_name,
            fee_percentage: calculation.platform_fee_percentage,
            user_tier: structure.tier,
        },
        affiliate,
    )?;

    state
        .fees
        .update_user_rental_count(user_id, structure.rental_count + 1);

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            record_id: record.id.0,
            platform_fee: record.commission,
            owner_payout: record.owner_payout,
            total_with_fees: calculation.total_with_fees,
        }),
    ))
}

/// GET /fees/{user_id} - Quote a $100.00 rental for the user.
async fn quote_fees(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<Json<rentmarket::FeeCalculation>, AppError> {
    let calculation = state.fees.calculate_fees(UserId(user_id), 10_000, 0)?;
    Ok(Json(calculation))
}

/// GET /analytics - Platform fee analytics.
async fn analytics(State(state): State<AppState>) -> Json<rentmarket::FeeAnalytics> {
    Json(state.fees.fee_analytics(&state.ledger))
}

/// POST /messages - Send a chat message.
async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let message = state.chat.send_message(
        UserId(request.sender_id),
        UserId(request.receiver_id),
        &request.content,
        request.room_id.map(RoomId),
    )?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /rooms/{user_id} - List a user's chat rooms.
async fn list_rooms(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Json<Vec<rentmarket::RoomSnapshot>> {
    Json(state.chat.get_chat_rooms(UserId(user_id)))
}

/// GET /rooms/{room_id}/messages - List a room's messages in send order.
async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.chat.get_chat_messages(RoomId(room_id))?;
    Ok(Json(messages))
}

/// POST /reads - Mark a room's messages as read.
async fn mark_read(
    State(state): State<AppState>,
    Json(request): Json<ReadRequest>,
) -> Result<StatusCode, AppError> {
    state
        .chat
        .mark_messages_read(RoomId(request.room_id), UserId(request.user_id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /reports - Report a message.
async fn report_message(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<StatusCode, AppError> {
    state.chat.report_message(
        MessageId(request.message_id),
        UserId(request.reporter_id),
        &request.reason,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /blocks - Block a user.
async fn block_user(
    State(state): State<AppState>,
    Json(request): Json<BlockRequest>,
) -> StatusCode {
    state
        .chat
        .block_user(UserId(request.blocker_id), UserId(request.blocked_id));
    StatusCode::NO_CONTENT
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/fees/{user_id}", get(quote_fees))
        .route("/analytics", get(analytics))
        .route("/messages", post(send_message))
        .route("/rooms/{user_id}", get(list_rooms))
        .route("/rooms/{room_id}/messages", get(list_messages))
        .route("/reads", post(mark_read))
        .route("/reports", post(report_message))
        .route("/blocks", post(block_user))
        .with_state(state)
}

/// Registers a handful of demo chat profiles.
///
/// Seeding is explicit and happens once here at startup; the engines never
/// self-populate.
fn seed_demo_profiles(chat: &ChatEngine) {
    for (id, name) in [(1, "Dana"), (2, "Sam"), (3, "Riley")] {
        chat.register_profile(UserChatProfile {
            user_id: UserId(id),
            display_name: name.to_string(),
            avatar: None,
            verification_level: 2,
            safety_score: 95,
            is_online: true,
            last_seen: Utc::now(),
            response_time: "within an hour".to_string(),
            badges: vec!["id_verified".to_string()],
        });
    }
}

// === Main ===

#[tokio::main]
async fn main() {
    let state = AppState {
        fees: Arc::new(FeeEngine::new()),
        ledger: Arc::new(CommissionLedger::new()),
        chat: Arc::new(ChatEngine::new()),
    };
    seed_demo_profiles(&state.chat);

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Rentmarket API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /checkout                 - Record a rental checkout");
    println!("  GET  /fees/:user_id            - Quote fees for a user");
    println!("  GET  /analytics                - Platform analytics");
    println!("  POST /messages                 - Send a chat message");
    println!("  GET  /rooms/:user_id           - List a user's rooms");
    println!("  GET  /rooms/:room_id/messages  - List room messages");

    axum::serve(listener, app).await.unwrap();
}
