use crate::model::{BucketWindow, Cik};
use crate::storage::entity::article_score::{self, Entity as ArticleScore};
use crate::storage::entity::run_company_score::{self, Entity as RunCompanyScore};
use crate::storage::entity::scoring_run::{self, ActiveModel as ScoringRunActiveModel, Entity as ScoringRun};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult,
    IntoActiveModel, QueryFilter, QueryOrder, Set, Statement,
};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct NewScoringRun {
    pub experiment_id: i32,
    pub min_days_before: i32,
    pub max_days_before: i32,
    pub batch_size: i32,
    pub model_name: String,
    pub run_label: Option<String>,
}

/// 候选文章：一条新闻 × 一家已打标签的公司
#[derive(Debug, Clone, FromQueryResult)]
pub struct CandidateRow {
    pub time_bucket: String,
    pub record_id: String,
    pub document_url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub cik: i64,
    pub company_title: Option<String>,
    pub label: i32,
}

const CANDIDATE_SQL: &str = r#"
SELECT n.time_bucket, n.record_id, n.document_url, n.title, n.snippet,
       l.cik AS cik, c.title AS company_title, l.label AS label
FROM company_links AS cl
JOIN news_records AS n
  ON n.time_bucket = cl.time_bucket AND n.record_id = cl.record_id
JOIN experiment_labels AS l
  ON l.cik = cl.cik
LEFT JOIN companies AS c
  ON c.cik = cl.cik
WHERE l.experiment_id = ?
  AND n.document_url IS NOT NULL
  AND n.document_url <> ''
  AND n.time_bucket BETWEEN ? AND ?
ORDER BY n.time_bucket, n.record_id, l.cik
"#;

const REFRESH_LABELS_SQL: &str = r#"
UPDATE article_scores
SET label = (
    SELECT l.label FROM experiment_labels AS l
    WHERE l.experiment_id = ? AND l.cik = article_scores.cik
)
WHERE run_id = ?
"#;

pub struct ScoreRepository;

impl ScoreRepository {
    pub async fn create_run<C: ConnectionTrait>(
        db: &C,
        new: NewScoringRun,
    ) -> Result<scoring_run::Model, sea_orm::DbErr> {
        let active_model = ScoringRunActiveModel {
            experiment_id: Set(new.experiment_id),
            min_days_before: Set(new.min_days_before),
            max_days_before: Set(new.max_days_before),
            batch_size: Set(new.batch_size),
            model_name: Set(new.model_name),
            run_label: Set(new.run_label),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };
        active_model.insert(db).await
    }

    pub async fn find_run<C: ConnectionTrait>(
        db: &C,
        run_id: i32,
    ) -> Result<Option<scoring_run::Model>, sea_orm::DbErr> {
        ScoringRun::find_by_id(run_id).one(db).await
    }

    /// 文章分、公司分、指标由外键级联删除
    pub async fn delete_run<C: ConnectionTrait>(db: &C, run_id: i32) -> Result<u64, sea_orm::DbErr> {
        let res = ScoringRun::delete_by_id(run_id).exec(db).await?;
        Ok(res.rows_affected)
    }

    pub async fn candidate_articles<C: ConnectionTrait>(
        db: &C,
        experiment_id: i32,
        window: &BucketWindow,
    ) -> Result<Vec<CandidateRow>, sea_orm::DbErr> {
        CandidateRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            CANDIDATE_SQL,
            [
                experiment_id.into(),
                window.from.clone().into(),
                window.to.clone().into(),
            ],
        ))
        .all(db)
        .await
    }

    /// (run_id, cik, record_id) 冲突时覆盖分数与理由
    pub async fn upsert_article_scores<C: ConnectionTrait>(
        db: &C,
        rows: Vec<article_score::Model>,
    ) -> Result<u64, sea_orm::DbErr> {
        let mut written = 0u64;
        for chunk in rows.chunks(500) {
            let models = chunk.iter().cloned().map(|m| m.into_active_model());
            written += ArticleScore::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        article_score::Column::RunId,
                        article_score::Column::Cik,
                        article_score::Column::RecordId,
                    ])
                    .update_columns([
                        article_score::Column::ArticleUrl,
                        article_score::Column::ArticleTitle,
                        article_score::Column::Score,
                        article_score::Column::Reason,
                        article_score::Column::Label,
                        article_score::Column::EvaluatedAt,
                    ])
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }
        Ok(written)
    }

    pub async fn article_scores_for_run<C: ConnectionTrait>(
        db: &C,
        run_id: i32,
    ) -> Result<Vec<article_score::Model>, sea_orm::DbErr> {
        ArticleScore::find()
            .filter(article_score::Column::RunId.eq(run_id))
            .order_by_asc(article_score::Column::Cik)
            .order_by_asc(article_score::Column::RecordId)
            .all(db)
            .await
    }

    /// 用实验标签表刷新文章行上的 label 副本；缺标签的行变为 NULL
    pub async fn refresh_article_labels<C: ConnectionTrait>(
        db: &C,
        run_id: i32,
        experiment_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let res = db
            .execute(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                REFRESH_LABELS_SQL,
                [experiment_id.into(), run_id.into()],
            ))
            .await?;
        Ok(res.rows_affected())
    }

    /// 整体替换该 run 的公司聚合行，调用方负责事务
    pub async fn replace_company_scores<C: ConnectionTrait>(
        db: &C,
        run_id: i32,
        rows: Vec<run_company_score::Model>,
    ) -> Result<(), sea_orm::DbErr> {
        RunCompanyScore::delete_many()
            .filter(run_company_score::Column::RunId.eq(run_id))
            .exec(db)
            .await?;
        for chunk in rows.chunks(500) {
            let models = chunk.iter().cloned().map(|m| m.into_active_model());
            RunCompanyScore::insert_many(models)
                .exec_without_returning(db)
                .await?;
        }
        Ok(())
    }

    pub async fn company_scores_for_run<C: ConnectionTrait>(
        db: &C,
        run_id: i32,
    ) -> Result<Vec<run_company_score::Model>, sea_orm::DbErr> {
        RunCompanyScore::find()
            .filter(run_company_score::Column::RunId.eq(run_id))
            .order_by_desc(run_company_score::Column::TotalScore)
            .order_by_asc(run_company_score::Column::Cik)
            .all(db)
            .await
    }

    /// 每家公司分数最高的 per_company 条文章（同分取较新的）
    pub async fn evidence_for<C: ConnectionTrait>(
        db: &C,
        run_id: i32,
        ciks: &[Cik],
        per_company: usize,
    ) -> Result<HashMap<Cik, Vec<article_score::Model>>, sea_orm::DbErr> {
        if ciks.is_empty() || per_company == 0 {
            return Ok(HashMap::new());
        }
        let rows = ArticleScore::find()
            .filter(article_score::Column::RunId.eq(run_id))
            .filter(article_score::Column::Cik.is_in(ciks.to_vec()))
            .order_by_asc(article_score::Column::Cik)
            .order_by_desc(article_score::Column::Score)
            .order_by_desc(article_score::Column::EvaluatedAt)
            .order_by_asc(article_score::Column::RecordId)
            .all(db)
            .await?;
        let mut out: HashMap<Cik, Vec<article_score::Model>> = HashMap::new();
        for row in rows {
            let bucket = out.entry(row.cik).or_default();
            if bucket.len() < per_company {
                bucket.push(row);
            }
        }
        Ok(out)
    }
}
