use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scoring_runs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub experiment_id: i32,
    pub min_days_before: i32,
    pub max_days_before: i32,
    pub batch_size: i32,
    pub model_name: String,
    #[sea_orm(nullable)]
    pub run_label: Option<String>,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::experiment::Entity",
        from = "Column::ExperimentId",
        to = "super::experiment::Column::Id",
        on_delete = "Cascade"
    )]
    Experiment,
    #[sea_orm(has_many = "super::article_score::Entity")]
    ArticleScore,
}

impl Related<super::experiment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Experiment.def()
    }
}

impl Related<super::article_score::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ArticleScore.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
