//! 点击事件表迁移
//!
//! 创建 click_events 表，作为分析管线的追加式原始事件日志：
//! - 时间戳
//! - 来源 (referrer) 原始字符串
//! - 用户代理 (user_agent) 原始字符串，设备分类在聚合时解析
//! - 地理位置 (country, city)，在持久化时由 IP 推导，原始 IP 不落盘

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClickEvents::ShortCode)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickEvents::ClickedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClickEvents::Referrer).text().null())
                    .col(ColumnDef::new(ClickEvents::UserAgent).text().null())
                    .col(ColumnDef::new(ClickEvents::Country).string_len(64).null())
                    .col(ColumnDef::new(ClickEvents::City).string_len(100).null())
                    .to_owned(),
            )
            .await?;

        // 复合索引（单链接时间范围查询是聚合器的主要访问模式）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_code_time")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::ShortCode)
                    .col(ClickEvents::ClickedAt)
                    .to_owned(),
            )
            .await?;

        // clicked_at 索引（用于全局 lag 水位查询）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_clicked_at")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::ClickedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_click_events_clicked_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_click_events_code_time").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ClickEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickEvents {
    #[sea_orm(iden = "click_events")]
    Table,
    Id,
    ShortCode,
    ClickedAt,
    Referrer,
    UserAgent,
    Country,
    City,
}
