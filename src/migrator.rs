//! Embedded schema migrations, run by [`crate::db::run_migrations`].

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_items_table::Migration),
            Box::new(m20250301_000002_create_accounts_table::Migration),
            Box::new(m20250301_000003_create_ledger_entries_table::Migration),
            Box::new(m20250301_000004_create_consignments_table::Migration),
            Box::new(m20250301_000005_create_consignment_lines_table::Migration),
            Box::new(m20250301_000006_create_settlement_sales_table::Migration),
            Box::new(m20250301_000007_create_sequences_table::Migration),
        ]
    }
}

mod m20250301_000001_create_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::SerialCode).string().not_null())
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(
                            ColumnDef::new(Items::CurrentCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Items::PurchaseCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Items::UnitPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Items::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Items::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_items_serial_code")
                        .table(Items::Table)
                        .col(Items::SerialCode)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Items {
        Table,
        Id,
        SerialCode,
        Name,
        CurrentCount,
        PurchaseCount,
        UnitPrice,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_accounts_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_accounts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Accounts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Accounts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Accounts::Name).string().not_null())
                        .col(ColumnDef::new(Accounts::NormalizedName).string().not_null())
                        .col(ColumnDef::new(Accounts::Phone).string().null())
                        .col(ColumnDef::new(Accounts::Kind).string().not_null())
                        .col(
                            ColumnDef::new(Accounts::Balance)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Accounts::Direction).string().not_null())
                        .col(ColumnDef::new(Accounts::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Accounts::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // The identity constraint: one row per logical party. Concurrent
            // find-or-create races resolve against this index.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_accounts_normalized_name_kind")
                        .table(Accounts::Table)
                        .col(Accounts::NormalizedName)
                        .col(Accounts::Kind)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_accounts_kind")
                        .table(Accounts::Table)
                        .col(Accounts::Kind)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Accounts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Accounts {
        Table,
        Id,
        Name,
        NormalizedName,
        Phone,
        Kind,
        Balance,
        Direction,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000003_create_ledger_entries_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_ledger_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LedgerEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LedgerEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::AccountId).uuid().not_null())
                        .col(ColumnDef::new(LedgerEntries::Kind).string().not_null())
                        .col(ColumnDef::new(LedgerEntries::Amount).decimal().not_null())
                        .col(
                            ColumnDef::new(LedgerEntries::BalanceAfter)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::EffectiveOn).date().not_null())
                        .col(
                            ColumnDef::new(LedgerEntries::RecordedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::ReferenceId).uuid().null())
                        .col(ColumnDef::new(LedgerEntries::Breakdown).json().null())
                        .col(ColumnDef::new(LedgerEntries::Note).string().null())
                        .to_owned(),
                )
                .await?;

            // Serves both entry listing and the point-in-time scan:
            // latest entry per account strictly before a cutoff date.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ledger_entries_account_effective")
                        .table(LedgerEntries::Table)
                        .col(LedgerEntries::AccountId)
                        .col(LedgerEntries::EffectiveOn)
                        .col(LedgerEntries::RecordedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ledger_entries_reference_id")
                        .table(LedgerEntries::Table)
                        .col(LedgerEntries::ReferenceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum LedgerEntries {
        Table,
        Id,
        AccountId,
        Kind,
        Amount,
        BalanceAfter,
        EffectiveOn,
        RecordedAt,
        ReferenceId,
        Breakdown,
        Note,
    }
}

mod m20250301_000004_create_consignments_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_consignments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Consignments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Consignments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Consignments::Number).string().not_null())
                        .col(ColumnDef::new(Consignments::PersonName).string().not_null())
                        .col(ColumnDef::new(Consignments::Phone).string().null())
                        .col(ColumnDef::new(Consignments::AccountId).uuid().not_null())
                        .col(ColumnDef::new(Consignments::IssuedOn).date().not_null())
                        .col(
                            ColumnDef::new(Consignments::ExpectedReturnOn)
                                .date()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Consignments::Status).string().not_null())
                        .col(
                            ColumnDef::new(Consignments::TotalIssuedValue)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Consignments::TotalSoldValue)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Consignments::TotalReturnedValue)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Consignments::SettledAt).timestamp().null())
                        .col(ColumnDef::new(Consignments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Consignments::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_consignments_number")
                        .table(Consignments::Table)
                        .col(Consignments::Number)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // The overdue sweep scans by status + expected return date.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consignments_status_expected_return")
                        .table(Consignments::Table)
                        .col(Consignments::Status)
                        .col(Consignments::ExpectedReturnOn)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consignments_account_id")
                        .table(Consignments::Table)
                        .col(Consignments::AccountId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Consignments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Consignments {
        Table,
        Id,
        Number,
        PersonName,
        Phone,
        AccountId,
        IssuedOn,
        ExpectedReturnOn,
        Status,
        TotalIssuedValue,
        TotalSoldValue,
        TotalReturnedValue,
        SettledAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000005_create_consignment_lines_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000005_create_consignment_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ConsignmentLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsignmentLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::ConsignmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsignmentLines::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(ConsignmentLines::IssuedQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::SoldQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::ReturnedQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::UnitPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::IssuedValue)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::SoldValue)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::ReturnedValue)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsignmentLines::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consignment_lines_consignment_id")
                        .table(ConsignmentLines::Table)
                        .col(ConsignmentLines::ConsignmentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consignment_lines_item_id")
                        .table(ConsignmentLines::Table)
                        .col(ConsignmentLines::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConsignmentLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ConsignmentLines {
        Table,
        Id,
        ConsignmentId,
        ItemId,
        IssuedQty,
        SoldQty,
        ReturnedQty,
        UnitPrice,
        IssuedValue,
        SoldValue,
        ReturnedValue,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000006_create_settlement_sales_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000006_create_settlement_sales_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SettlementSales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SettlementSales::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SettlementSales::InvoiceNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SettlementSales::ConsignmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SettlementSales::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(SettlementSales::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SettlementSales::UnitPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SettlementSales::TotalValue)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(SettlementSales::SoldOn).date().not_null())
                        .col(
                            ColumnDef::new(SettlementSales::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_settlement_sales_consignment_id")
                        .table(SettlementSales::Table)
                        .col(SettlementSales::ConsignmentId)
                        .to_owned(),
                )
                .await?;

            // Lookup only: invoice numbers are probabilistically unique by
            // construction, not constrained.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_settlement_sales_invoice_number")
                        .table(SettlementSales::Table)
                        .col(SettlementSales::InvoiceNumber)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SettlementSales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum SettlementSales {
        Table,
        Id,
        InvoiceNumber,
        ConsignmentId,
        ItemId,
        Quantity,
        UnitPrice,
        TotalValue,
        SoldOn,
        CreatedAt,
    }
}

mod m20250301_000007_create_sequences_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000007_create_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Sequences::Name)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sequences::Current)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            // Counter rows are incremented in place, never inserted at use
            // time, so each named sequence must exist up front.
            let seed = Query::insert()
                .into_table(Sequences::Table)
                .columns([Sequences::Name, Sequences::Current])
                .values_panic(["consignment".into(), 0i64.into()])
                .to_owned();
            manager.exec_stmt(seed).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Sequences {
        Table,
        Name,
        Current,
    }
}
