use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::models::fee_record::{FeeAdjustment, PaymentDetails};
use crate::models::{FeeRecord, FeeStructure, Student, User};
use crate::store::{
    FeeFilter, FeeRecordStore, FeeStructureStore, FeeSummary, PageRequest, StoreResult,
    StudentFeeSummary, StudentFilter, StudentStore, UserStore,
};

const STRUCTURE_COLUMNS: &str = "id, class_name, section, academic_year, components, \
                                 total_monthly_fee, status, created_at, updated_at";

const STUDENT_COLUMNS: &str = "id, name, email, phone, class_name, section, roll_number, \
                               parent_name, parent_email, parent_phone, address, status, \
                               academic_year, created_at, updated_at";

const FEE_COLUMNS: &str = "id, student_id, fee_structure_id, invoice_number, month, year, \
                           academic_year, fee_type, components, base_fee_amount, total_discount, \
                           discount_reason, additional_charges, final_amount, due_date, is_paid, \
                           paid_date, payment_method, transaction_id, generated_by, \
                           generation_type, status, remarks, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";

/// Escapes LIKE wildcards in `text` and wraps it for a substring match.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// PostgreSQL-backed implementation of every store trait.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_fee_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &FeeFilter) {
    qb.push(" WHERE TRUE");
    if let Some(month) = &filter.month {
        qb.push(" AND month = ").push_bind(month.clone());
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(is_paid) = filter.is_paid {
        qb.push(" AND is_paid = ").push_bind(is_paid);
    }
    if let Some(student_id) = filter.student_id {
        qb.push(" AND student_id = ").push_bind(student_id);
    } else if let Some(search) = &filter.search {
        qb.push(" AND (invoice_number ILIKE ")
            .push_bind(like_pattern(&search.text))
            .push(" OR student_id = ANY(")
            .push_bind(search.student_ids.clone())
            .push("))");
    }
}

fn push_student_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &StudentFilter) {
    qb.push(" WHERE TRUE");
    if let Some(class_name) = &filter.class_name {
        qb.push(" AND class_name = ").push_bind(class_name.clone());
    }
    if let Some(section) = &filter.section {
        qb.push(" AND section = ").push_bind(section.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR roll_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR parent_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl FeeStructureStore for PgStore {
    async fn insert_structure(&self, structure: &FeeStructure) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fee_structures (
                id, class_name, section, academic_year, components,
                total_monthly_fee, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(structure.id)
        .bind(&structure.class_name)
        .bind(&structure.section)
        .bind(&structure.academic_year)
        .bind(&structure.components)
        .bind(structure.total_monthly_fee)
        .bind(structure.status)
        .bind(structure.created_at)
        .bind(structure.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_active_structure(
        &self,
        class_name: &str,
        academic_year: &str,
    ) -> StoreResult<Option<FeeStructure>> {
        let query = format!(
            "SELECT {STRUCTURE_COLUMNS} FROM fee_structures
             WHERE class_name = $1 AND academic_year = $2 AND status = 'active'"
        );
        let structure = sqlx::query_as::<_, FeeStructure>(&query)
            .bind(class_name)
            .bind(academic_year)
            .fetch_optional(&self.pool)
            .await?;
        Ok(structure)
    }

    async fn list_active_structures(
        &self,
        academic_year: Option<&str>,
        class_names: &[String],
    ) -> StoreResult<Vec<FeeStructure>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {STRUCTURE_COLUMNS} FROM fee_structures WHERE status = 'active'"
        ));
        if let Some(year) = academic_year {
            qb.push(" AND academic_year = ").push_bind(year.to_string());
        }
        if !class_names.is_empty() {
            qb.push(" AND class_name = ANY(")
                .push_bind(class_names.to_vec())
                .push(")");
        }
        qb.push(" ORDER BY class_name ASC, academic_year ASC");

        let structures = qb
            .build_query_as::<FeeStructure>()
            .fetch_all(&self.pool)
            .await?;
        Ok(structures)
    }

    async fn deactivate_structure(&self, id: Uuid) -> StoreResult<Option<FeeStructure>> {
        let query = format!(
            "UPDATE fee_structures SET status = 'inactive', updated_at = NOW()
             WHERE id = $1
             RETURNING {STRUCTURE_COLUMNS}"
        );
        let structure = sqlx::query_as::<_, FeeStructure>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(structure)
    }
}

impl StudentStore for PgStore {
    async fn insert_student(&self, student: &Student) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO students (
                id, name, email, phone, class_name, section, roll_number,
                parent_name, parent_email, parent_phone, address, status,
                academic_year, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(student.id)
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.class_name)
        .bind(&student.section)
        .bind(&student.roll_number)
        .bind(&student.parent_name)
        .bind(&student.parent_email)
        .bind(&student.parent_phone)
        .bind(&student.address)
        .bind(student.status)
        .bind(&student.academic_year)
        .bind(student.created_at)
        .bind(student.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        let query = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1");
        let student = sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(student)
    }

    async fn update_student(&self, student: &Student) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE students SET
                name = $2, email = $3, phone = $4, class_name = $5, section = $6,
                roll_number = $7, parent_name = $8, parent_email = $9,
                parent_phone = $10, address = $11, status = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(student.id)
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.class_name)
        .bind(&student.section)
        .bind(&student.roll_number)
        .bind(&student.parent_name)
        .bind(&student.parent_email)
        .bind(&student.parent_phone)
        .bind(&student.address)
        .bind(student.status)
        .bind(student.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_students(
        &self,
        filter: &StudentFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<Student>, i64)> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {STUDENT_COLUMNS} FROM students"));
        push_student_filter(&mut qb, filter);
        qb.push(" ORDER BY class_name ASC, section ASC, roll_number ASC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset());
        let students = qb.build_query_as::<Student>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM students");
        push_student_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((students, total))
    }

    async fn active_students_in_class(
        &self,
        class_name: &str,
        section: Option<&str>,
        student_ids: Option<&[Uuid]>,
    ) -> StoreResult<Vec<Student>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE status = 'active' AND class_name = "
        ));
        qb.push_bind(class_name.to_string());
        if let Some(section) = section {
            qb.push(" AND section = ").push_bind(section.to_string());
        }
        if let Some(ids) = student_ids {
            qb.push(" AND id = ANY(").push_bind(ids.to_vec()).push(")");
        }
        qb.push(" ORDER BY roll_number ASC");

        let students = qb.build_query_as::<Student>().fetch_all(&self.pool).await?;
        Ok(students)
    }

    async fn find_students_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Student>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ANY($1)");
        let students = sqlx::query_as::<_, Student>(&query)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(students)
    }

    async fn search_student_ids(&self, text: &str) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM students WHERE name ILIKE $1 OR roll_number ILIKE $1",
        )
        .bind(like_pattern(text))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn count_students_in_section(
        &self,
        class_name: &str,
        section: &str,
        academic_year: &str,
    ) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM students
             WHERE class_name = $1 AND section = $2 AND academic_year = $3",
        )
        .bind(class_name)
        .bind(section)
        .bind(academic_year)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

impl FeeRecordStore for PgStore {
    async fn next_invoice_sequence(&self) -> StoreResult<i64> {
        let next = sqlx::query_scalar::<_, i64>("SELECT nextval('fee_invoice_seq')")
            .fetch_one(&self.pool)
            .await?;
        Ok(next)
    }

    async fn insert_fee(&self, fee: &FeeRecord) -> StoreResult<()> {
        // final_amount is a generated column.
        sqlx::query(
            r#"
            INSERT INTO fee_records (
                id, student_id, fee_structure_id, invoice_number, month, year,
                academic_year, fee_type, components, base_fee_amount, total_discount,
                discount_reason, additional_charges, due_date, is_paid, paid_date,
                payment_method, transaction_id, generated_by, generation_type,
                status, remarks, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            "#,
        )
        .bind(fee.id)
        .bind(fee.student_id)
        .bind(fee.fee_structure_id)
        .bind(&fee.invoice_number)
        .bind(&fee.month)
        .bind(fee.year)
        .bind(&fee.academic_year)
        .bind(fee.fee_type)
        .bind(&fee.components)
        .bind(fee.base_fee_amount)
        .bind(fee.total_discount)
        .bind(&fee.discount_reason)
        .bind(fee.additional_charges)
        .bind(fee.due_date)
        .bind(fee.is_paid)
        .bind(fee.paid_date)
        .bind(&fee.payment_method)
        .bind(&fee.transaction_id)
        .bind(&fee.generated_by)
        .bind(fee.generation_type)
        .bind(fee.status)
        .bind(&fee.remarks)
        .bind(fee.created_at)
        .bind(fee.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_fee(&self, id: Uuid) -> StoreResult<Option<FeeRecord>> {
        let query = format!("SELECT {FEE_COLUMNS} FROM fee_records WHERE id = $1");
        let fee = sqlx::query_as::<_, FeeRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(fee)
    }

    async fn find_fee_for_period(
        &self,
        student_id: Uuid,
        month: &str,
        year: i32,
    ) -> StoreResult<Option<FeeRecord>> {
        let query = format!(
            "SELECT {FEE_COLUMNS} FROM fee_records
             WHERE student_id = $1 AND month = $2 AND year = $3"
        );
        let fee = sqlx::query_as::<_, FeeRecord>(&query)
            .bind(student_id)
            .bind(month)
            .bind(year)
            .fetch_optional(&self.pool)
            .await?;
        Ok(fee)
    }

    async fn update_adjustment(
        &self,
        id: Uuid,
        adjustment: &FeeAdjustment,
    ) -> StoreResult<Option<FeeRecord>> {
        let query = format!(
            "UPDATE fee_records SET
                total_discount = $2,
                discount_reason = $3,
                additional_charges = $4,
                remarks = COALESCE($5, remarks),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {FEE_COLUMNS}"
        );
        let fee = sqlx::query_as::<_, FeeRecord>(&query)
            .bind(id)
            .bind(adjustment.discount)
            .bind(&adjustment.discount_reason)
            .bind(adjustment.additional_charges)
            .bind(&adjustment.remarks)
            .fetch_optional(&self.pool)
            .await?;
        Ok(fee)
    }

    async fn record_payment(
        &self,
        id: Uuid,
        payment: &PaymentDetails,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<Option<FeeRecord>> {
        let query = format!(
            "UPDATE fee_records SET
                is_paid = TRUE,
                paid_date = $2,
                status = 'paid',
                payment_method = $3,
                transaction_id = COALESCE($4, transaction_id),
                remarks = COALESCE($5, remarks),
                updated_at = $2
             WHERE id = $1 AND is_paid = FALSE AND status <> 'cancelled'
             RETURNING {FEE_COLUMNS}"
        );
        let fee = sqlx::query_as::<_, FeeRecord>(&query)
            .bind(id)
            .bind(paid_at)
            .bind(&payment.method)
            .bind(&payment.transaction_id)
            .bind(&payment.remarks)
            .fetch_optional(&self.pool)
            .await?;
        Ok(fee)
    }

    async fn fee_page(
        &self,
        filter: &FeeFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<FeeRecord>, FeeSummary)> {
        // Page and summary must describe the same snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {FEE_COLUMNS} FROM fee_records"));
        push_fee_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, invoice_number DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset());
        let fees = qb.build_query_as::<FeeRecord>().fetch_all(&mut *tx).await?;

        let mut summary_qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                COALESCE(SUM(base_fee_amount), 0) AS total_amount,
                COALESCE(SUM(base_fee_amount) FILTER (WHERE is_paid), 0) AS paid_amount,
                COALESCE(SUM(base_fee_amount) FILTER (WHERE NOT is_paid), 0) AS pending_amount,
                COUNT(*) AS total_fees
            FROM fee_records
            "#,
        );
        push_fee_filter(&mut summary_qb, filter);
        let summary = summary_qb
            .build_query_as::<FeeSummary>()
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            returned = fees.len(),
            matching = summary.total_fees,
            "Loaded fee page"
        );
        Ok((fees, summary))
    }

    async fn student_fee_summary(&self, student_id: Uuid) -> StoreResult<StudentFeeSummary> {
        let summary = sqlx::query_as::<_, StudentFeeSummary>(
            r#"
            SELECT
                COALESCE(SUM(base_fee_amount) FILTER (WHERE NOT is_paid), 0) AS total_pending,
                COALESCE(SUM(base_fee_amount) FILTER (WHERE is_paid), 0) AS total_paid,
                COUNT(*) AS fees_count
            FROM fee_records
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }
}

impl UserStore for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Month, NaiveDate};
    use rust_decimal::Decimal;

    use crate::models::fee_record::NewFeeRecord;
    use crate::models::student::NewStudent;
    use crate::models::{BillingPeriod, FeeStatus, FeeType, GenerationType};
    use crate::store::{constraints, StoreError};

    /// Connects to `DATABASE_URL` and applies the migrations.
    async fn test_store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        PgStore::new(pool)
    }

    fn student(roll_number: &str) -> Student {
        Student::new(NewStudent {
            name: "Test Student".into(),
            email: None,
            phone: None,
            class_name: "3rd".into(),
            section: "A".into(),
            roll_number: roll_number.into(),
            parent_name: None,
            parent_email: None,
            parent_phone: None,
            address: None,
            academic_year: "2025".into(),
        })
    }

    fn fee(student_id: Uuid, invoice_number: String) -> FeeRecord {
        FeeRecord::new(NewFeeRecord {
            student_id,
            fee_structure_id: None,
            invoice_number,
            period: BillingPeriod::new(Month::January, 2025),
            academic_year: "2025".into(),
            fee_type: FeeType::Monthly,
            components: Vec::new(),
            base_fee_amount: Decimal::from(2700),
            due_date: NaiveDate::from_ymd_opt(2025, 2, 15).unwrap(),
            generated_by: Some("test".into()),
            generation_type: GenerationType::Manual,
            remarks: None,
        })
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_duplicate_roll_number_is_a_conflict() {
        let store = test_store().await;
        let roll = format!("T{}", &Uuid::new_v4().simple().to_string()[..8]);

        store.insert_student(&student(&roll)).await.unwrap();
        let err = store.insert_student(&student(&roll)).await.unwrap_err();
        assert!(err.is_conflict_on(constraints::STUDENT_ROLL_NUMBER));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_period_uniqueness_and_single_payment() {
        let store = test_store().await;
        let owner = student(&format!("T{}", &Uuid::new_v4().simple().to_string()[..8]));
        store.insert_student(&owner).await.unwrap();

        let seq = store.next_invoice_sequence().await.unwrap();
        let record = fee(owner.id, format!("INV-TEST-{seq}"));
        store.insert_fee(&record).await.unwrap();

        let seq = store.next_invoice_sequence().await.unwrap();
        let again = store
            .insert_fee(&fee(owner.id, format!("INV-TEST-{seq}")))
            .await
            .unwrap_err();
        assert!(matches!(again, StoreError::Conflict { .. }));
        assert!(again.is_conflict_on(constraints::FEE_STUDENT_PERIOD));

        let payment = PaymentDetails {
            method: "cash".into(),
            transaction_id: None,
            remarks: None,
        };
        let paid = store
            .record_payment(record.id, &payment, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(paid.is_paid);
        assert!(store
            .record_payment(record.id, &payment, Utc::now())
            .await
            .unwrap()
            .is_none());

        let summary = store.student_fee_summary(owner.id).await.unwrap();
        assert_eq!(summary.fees_count, 1);
        assert_eq!(summary.total_paid, Decimal::from(2700));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_cancelled_fee_cannot_be_settled() {
        let store = test_store().await;
        let owner = student(&format!("T{}", &Uuid::new_v4().simple().to_string()[..8]));
        store.insert_student(&owner).await.unwrap();

        let seq = store.next_invoice_sequence().await.unwrap();
        let mut record = fee(owner.id, format!("INV-TEST-{seq}"));
        record.status = FeeStatus::Cancelled;
        store.insert_fee(&record).await.unwrap();

        let payment = PaymentDetails {
            method: "cash".into(),
            transaction_id: None,
            remarks: None,
        };
        assert!(store
            .record_payment(record.id, &payment, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert!(!store.find_fee(record.id).await.unwrap().unwrap().is_paid);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ravi"), "%ravi%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
