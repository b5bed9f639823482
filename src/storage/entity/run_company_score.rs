use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "run_company_scores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub run_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub cik: i64,
    pub experiment_id: i32,
    pub total_score: i64,
    pub article_count: i64,
    #[sea_orm(nullable)]
    pub label: Option<i32>, // NULL = 无标签（完整性告警）
    pub computed_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scoring_run::Entity",
        from = "Column::RunId",
        to = "super::scoring_run::Column::Id",
        on_delete = "Cascade"
    )]
    ScoringRun,
}

impl ActiveModelBehavior for ActiveModel {}
