use crate::model::{BucketWindow, Cik};
use crate::storage::entity::company_link::{self, Entity as CompanyLink};
use crate::storage::entity::news_record::{self, Entity as NewsRecord};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, FromQueryResult)]
pub struct NewsCountRow {
    pub cik: i64,
    pub count: i64,
}

/// 分页游标：上一页最后一条的 (time_bucket, record_id)
pub type RecordCursor = (String, String);

pub struct LinkRepository;

impl LinkRepository {
    /// 已存在的三元组直接跳过，返回实际写入行数
    pub async fn insert_links<C: ConnectionTrait>(
        db: &C,
        links: &HashSet<company_link::Model>,
    ) -> Result<u64, sea_orm::DbErr> {
        if links.is_empty() {
            return Ok(0);
        }
        let mut rows: Vec<company_link::Model> = links.iter().cloned().collect();
        rows.sort_by(|a, b| {
            (&a.time_bucket, &a.record_id, a.cik).cmp(&(&b.time_bucket, &b.record_id, b.cik))
        });

        let mut written = 0u64;
        for chunk in rows.chunks(500) {
            let models = chunk.iter().cloned().map(|m| m.into_active_model());
            written += CompanyLink::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        company_link::Column::TimeBucket,
                        company_link::Column::RecordId,
                        company_link::Column::Cik,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }
        Ok(written)
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, sea_orm::DbErr> {
        CompanyLink::find().count(db).await
    }

    /// 窗口内每家公司被关联的新闻条数
    pub async fn news_counts<C: ConnectionTrait>(
        db: &C,
        window: &BucketWindow,
    ) -> Result<BTreeMap<Cik, u64>, sea_orm::DbErr> {
        let rows = CompanyLink::find()
            .select_only()
            .column(company_link::Column::Cik)
            .column_as(Expr::cust("COUNT(*)"), "count")
            .filter(company_link::Column::TimeBucket.between(window.from.clone(), window.to.clone()))
            .group_by(company_link::Column::Cik)
            .into_model::<NewsCountRow>()
            .all(db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.cik, r.count.max(0) as u64))
            .collect())
    }

    /// 按 (time_bucket, record_id) 升序的 keyset 分页
    pub async fn records_page<C: ConnectionTrait>(
        db: &C,
        window: Option<&BucketWindow>,
        after: Option<&RecordCursor>,
        limit: u64,
    ) -> Result<Vec<news_record::Model>, sea_orm::DbErr> {
        let mut query = NewsRecord::find();
        if let Some(w) = window {
            query = query.filter(news_record::Column::TimeBucket.between(w.from.clone(), w.to.clone()));
        }
        if let Some((bucket, record_id)) = after {
            query = query.filter(
                Condition::any()
                    .add(news_record::Column::TimeBucket.gt(bucket.clone()))
                    .add(
                        Condition::all()
                            .add(news_record::Column::TimeBucket.eq(bucket.clone()))
                            .add(news_record::Column::RecordId.gt(record_id.clone())),
                    ),
            );
        }
        query
            .order_by_asc(news_record::Column::TimeBucket)
            .order_by_asc(news_record::Column::RecordId)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn insert_records<C: ConnectionTrait>(
        db: &C,
        records: Vec<news_record::Model>,
    ) -> Result<u64, sea_orm::DbErr> {
        let mut written = 0u64;
        for chunk in records.chunks(500) {
            let models = chunk.iter().cloned().map(|m| m.into_active_model());
            written += NewsRecord::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        news_record::Column::TimeBucket,
                        news_record::Column::RecordId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }
        Ok(written)
    }
}
