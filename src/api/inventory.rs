use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::session::AuthUser;
use crate::errors::AppError;
use crate::models::chemical::{format_chemical_id, Chemical, StockDeduction, UsageRecord};
use crate::AppState;

const CHEMICAL_COUNTER: &str = "chemical_id";

const CHEMICAL_TYPES: &[&str] = &["Anhydrous", "Hydrous"];
const GRADES: &[&str] = &["LR", "AR"];
const PHASES: &[&str] = &["Solid", "Liquid", "Gas"];
const UNITS: &[&str] = &["g", "mL", "L"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChemicalRequest {
    pub chemical_name: String,
    pub chemical_type: String,
    pub grade: String,
    pub phase: String,
    pub quantity_available: f64,
    pub unit: String,
    pub make: Option<String>,
    #[serde(rename = "dateOfMFG")]
    pub date_of_mfg: NaiveDate,
    pub date_of_exp: NaiveDate,
    pub rack: String,
}

impl AddChemicalRequest {
    fn check(&self) -> Result<(), AppError> {
        let mut bad = Vec::new();
        if self.chemical_name.trim().is_empty() {
            bad.push("chemicalName");
        }
        if !CHEMICAL_TYPES.contains(&self.chemical_type.as_str()) {
            bad.push("chemicalType");
        }
        if !GRADES.contains(&self.grade.as_str()) {
            bad.push("grade");
        }
        if !PHASES.contains(&self.phase.as_str()) {
            bad.push("phase");
        }
        if !UNITS.contains(&self.unit.as_str()) {
            bad.push("unit");
        }
        if !self.quantity_available.is_finite() || self.quantity_available < 0.0 {
            bad.push("quantityAvailable");
        }
        if self.date_of_exp < self.date_of_mfg {
            bad.push("dateOfExp");
        }
        if self.rack.trim().is_empty() {
            bad.push("rack");
        }
        if bad.is_empty() {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!("invalid fields: {}", bad.join(", "))))
        }
    }
}

#[derive(Serialize)]
pub struct AddChemicalResponse {
    pub message: &'static str,
    pub chemical_id: String,
}

/// POST /addChemical: approver tiers only.
pub async fn add_chemical(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<AddChemicalRequest>,
) -> Result<(StatusCode, Json<AddChemicalResponse>), AppError> {
    auth.require_tier()?;
    req.check()?;

    let seq = state.store.next_sequence(CHEMICAL_COUNTER).await?;
    let chemical = Chemical {
        chemical_id: format_chemical_id(&state.config.chemical_id_prefix, seq),
        chemical_name: req.chemical_name.trim().to_string(),
        chemical_type: req.chemical_type,
        grade: req.grade,
        phase: req.phase,
        quantity_available: req.quantity_available,
        unit: req.unit,
        make: req.make.filter(|m| !m.trim().is_empty()),
        date_of_mfg: req.date_of_mfg,
        date_of_exp: req.date_of_exp,
        rack: req.rack,
        created_at: Utc::now(),
    };
    state.store.insert_chemical(&chemical).await?;

    tracing::info!(chemical_id = %chemical.chemical_id, by = %auth.id(), "chemical added");
    Ok((
        StatusCode::CREATED,
        Json(AddChemicalResponse {
            message: "Chemical added successfully",
            chemical_id: chemical.chemical_id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub chemical_id: Option<String>,
    pub quantity: Option<f64>,
}

#[derive(Serialize)]
pub struct IssueResponse {
    pub message: &'static str,
    pub updated_stock: f64,
}

/// POST /requestChemical: issues stock directly, no approval involved.
pub async fn request_chemical(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<IssueRequest>,
) -> Result<Json<IssueResponse>, AppError> {
    let (Some(chemical_id), Some(quantity)) = (req.chemical_id, req.quantity) else {
        return Err(AppError::BadRequest("chemicalId and quantity required".into()));
    };
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(AppError::BadRequest("quantity must be positive".into()));
    }

    let chemical = state
        .store
        .get_chemical(&chemical_id)
        .await?
        .ok_or(AppError::NotFound("chemical"))?;
    let user = state
        .store
        .get_user(auth.id())
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let usage = UsageRecord {
        id: Uuid::new_v4(),
        user_id: user.id,
        user_name: user.name,
        chemical_id: chemical.chemical_id.clone(),
        chemical_name: chemical.chemical_name,
        quantity_used: quantity,
        unit: chemical.unit,
        used_at: Utc::now(),
    };

    match state
        .store
        .deduct_stock(&chemical.chemical_id, quantity, &usage)
        .await?
    {
        StockDeduction::Issued { remaining } => {
            tracing::info!(
                chemical_id = %chemical.chemical_id,
                quantity,
                remaining,
                "stock issued"
            );
            Ok(Json(IssueResponse {
                message: "Chemical issued successfully",
                updated_stock: remaining,
            }))
        }
        StockDeduction::Insufficient { available } => {
            Err(AppError::InsufficientStock { available })
        }
        StockDeduction::NotFound => Err(AppError::NotFound("chemical")),
    }
}

/// One issuance as shown to approvers next to the chemical it drew from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEntry {
    pub user_name: String,
    pub quantity_used: f64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ChemicalListing {
    #[serde(flatten)]
    pub chemical: Chemical,
    #[serde(rename = "userUsage", skip_serializing_if = "Option::is_none")]
    pub user_usage: Option<Vec<UsageEntry>>,
}

/// GET /getchemicals: approvers also see who drew from each item.
pub async fn get_chemicals(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<ChemicalListing>>, AppError> {
    let chemicals = state.store.list_chemicals().await?;
    if auth.require_tier().is_err() {
        return Ok(Json(
            chemicals
                .into_iter()
                .map(|chemical| ChemicalListing { chemical, user_usage: None })
                .collect(),
        ));
    }

    let mut by_chemical: HashMap<String, Vec<UsageEntry>> = HashMap::new();
    for record in state.store.list_usage(None).await? {
        by_chemical
            .entry(record.chemical_id)
            .or_default()
            .push(UsageEntry {
                user_name: record.user_name,
                quantity_used: record.quantity_used,
                date: record.used_at,
            });
    }
    Ok(Json(
        chemicals
            .into_iter()
            .map(|chemical| {
                let usage = by_chemical.remove(&chemical.chemical_id).unwrap_or_default();
                ChemicalListing {
                    chemical,
                    user_usage: Some(usage),
                }
            })
            .collect(),
    ))
}

/// GET /getUserChemicals: every issuance for approvers, the caller's own otherwise.
pub async fn get_user_chemicals(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<UsageRecord>>, AppError> {
    let scope = match auth.require_tier() {
        Ok(_) => None,
        Err(_) => Some(auth.id()),
    };
    Ok(Json(state.store.list_usage(scope).await?))
}
