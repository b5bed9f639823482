use crate::model::Cik;
use crate::storage::entity::experiment::{self, ActiveModel as ExperimentActiveModel, Entity as Experiment};
use crate::storage::entity::label::{self, Entity as Label};
use crate::storage::entity::label_evidence::{self, Entity as LabelEvidence};
use crate::storage::entity::scoring_run::{self, Entity as ScoringRun};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::collections::{BTreeMap, HashMap};

/// 新建实验所需字段；config_json 为完整 ExperimentConfig 的序列化结果
#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub predict_date: NaiveDate,
    pub horizon_days: i32,
    pub item_codes_json: String,
    pub neg_multiplier: i32,
    pub seed: Option<i64>,
    pub config_json: String,
}

pub struct ExperimentRepository;

impl ExperimentRepository {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        new: NewExperiment,
    ) -> Result<experiment::Model, sea_orm::DbErr> {
        let active_model = ExperimentActiveModel {
            predict_date: Set(new.predict_date),
            horizon_days: Set(new.horizon_days),
            item_codes: Set(new.item_codes_json),
            neg_multiplier: Set(new.neg_multiplier),
            seed: Set(new.seed),
            config_json: Set(new.config_json),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };
        active_model.insert(db).await
    }

    pub async fn find<C: ConnectionTrait>(
        db: &C,
        id: i32,
    ) -> Result<Option<experiment::Model>, sea_orm::DbErr> {
        Experiment::find_by_id(id).one(db).await
    }

    /// 新的在前
    pub async fn list<C: ConnectionTrait>(db: &C) -> Result<Vec<experiment::Model>, sea_orm::DbErr> {
        Experiment::find()
            .order_by_desc(experiment::Column::Id)
            .all(db)
            .await
    }

    /// 标签、证据、打分运行及其下游行由外键级联删除
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i32) -> Result<u64, sea_orm::DbErr> {
        let res = Experiment::delete_by_id(id).exec(db).await?;
        Ok(res.rows_affected)
    }

    /// 先删后写，调用方负责包在事务里
    pub async fn replace_labels<C: ConnectionTrait>(
        db: &C,
        experiment_id: i32,
        labels: &[(Cik, i32)],
        evidence: Vec<label_evidence::Model>,
    ) -> Result<(), sea_orm::DbErr> {
        LabelEvidence::delete_many()
            .filter(label_evidence::Column::ExperimentId.eq(experiment_id))
            .exec(db)
            .await?;
        Label::delete_many()
            .filter(label::Column::ExperimentId.eq(experiment_id))
            .exec(db)
            .await?;

        for chunk in labels.chunks(500) {
            let models = chunk.iter().map(|(cik, value)| label::ActiveModel {
                experiment_id: Set(experiment_id),
                cik: Set(*cik),
                label: Set(*value),
            });
            Label::insert_many(models).exec_without_returning(db).await?;
        }
        for chunk in evidence.chunks(500) {
            let models = chunk.iter().cloned().map(label_evidence::ActiveModel::from);
            LabelEvidence::insert_many(models)
                .exec_without_returning(db)
                .await?;
        }
        Ok(())
    }

    pub async fn labels_for<C: ConnectionTrait>(
        db: &C,
        experiment_id: i32,
    ) -> Result<Vec<label::Model>, sea_orm::DbErr> {
        Label::find()
            .filter(label::Column::ExperimentId.eq(experiment_id))
            .order_by_asc(label::Column::Cik)
            .all(db)
            .await
    }

    pub async fn label_map<C: ConnectionTrait>(
        db: &C,
        experiment_id: i32,
    ) -> Result<HashMap<Cik, i32>, sea_orm::DbErr> {
        let rows = Self::labels_for(db, experiment_id).await?;
        Ok(rows.into_iter().map(|l| (l.cik, l.label)).collect())
    }

    pub async fn label_count<C: ConnectionTrait>(
        db: &C,
        experiment_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        Label::find()
            .filter(label::Column::ExperimentId.eq(experiment_id))
            .count(db)
            .await
    }

    /// 每家公司最早的一条触发依据（filing_date、accession、item 升序）
    pub async fn first_evidence<C: ConnectionTrait>(
        db: &C,
        experiment_id: i32,
        ciks: &[Cik],
    ) -> Result<HashMap<Cik, label_evidence::Model>, sea_orm::DbErr> {
        if ciks.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = LabelEvidence::find()
            .filter(label_evidence::Column::ExperimentId.eq(experiment_id))
            .filter(label_evidence::Column::Cik.is_in(ciks.to_vec()))
            .order_by_asc(label_evidence::Column::FilingDate)
            .order_by_asc(label_evidence::Column::AccessionNumber)
            .order_by_asc(label_evidence::Column::ItemCode)
            .all(db)
            .await?;
        let mut out = HashMap::new();
        for row in rows {
            out.entry(row.cik).or_insert(row);
        }
        Ok(out)
    }

    pub async fn run_ids_by_experiment<C: ConnectionTrait>(
        db: &C,
    ) -> Result<BTreeMap<i32, Vec<i32>>, sea_orm::DbErr> {
        let runs = ScoringRun::find()
            .order_by_asc(scoring_run::Column::Id)
            .all(db)
            .await?;
        let mut out: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        for run in runs {
            out.entry(run.experiment_id).or_default().push(run.id);
        }
        Ok(out)
    }
}
