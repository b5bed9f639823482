use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "experiments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub predict_date: Date,
    pub horizon_days: i32,
    pub item_codes: String, // JSON array
    pub neg_multiplier: i32,
    #[sea_orm(nullable)]
    pub seed: Option<i64>,
    pub config_json: String,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::label::Entity")]
    Label,
    #[sea_orm(has_many = "super::scoring_run::Entity")]
    ScoringRun,
}

impl Related<super::label::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Label.def()
    }
}

impl Related<super::scoring_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScoringRun.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
