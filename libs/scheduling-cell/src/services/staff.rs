use rusqlite::{params, Row};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::rows::parse_uuid;
use shared_database::Db;

use crate::models::{
    AssignServiceRequest, CreateEmployeeRequest, Employee, Gender, GenderPreference,
    SchedulingError,
};

pub struct StaffService {
    db: Db,
}

impl StaffService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn create_employee(
        &self,
        request: CreateEmployeeRequest,
    ) -> Result<Employee, SchedulingError> {
        if request.full_name.trim().is_empty() {
            return Err(SchedulingError::ValidationError(
                "Employee name cannot be empty".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        self.db.conn().execute(
            "INSERT INTO employees (id, full_name, gender, is_active) VALUES (?1, ?2, ?3, 1)",
            params![id.to_string(), request.full_name, request.gender.as_str()],
        )?;

        info!("employee {} created", id);
        self.get_employee(id)
    }

    pub fn get_employee(&self, employee_id: Uuid) -> Result<Employee, SchedulingError> {
        let conn = self.db.conn();
        let employee = conn
            .query_row(
                "SELECT id, full_name, gender, is_active FROM employees WHERE id = ?1",
                params![employee_id.to_string()],
                employee_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => SchedulingError::NotFound("employee"),
                other => SchedulingError::DatabaseError(other.to_string()),
            })?;
        Ok(employee)
    }

    pub fn list_employees(&self) -> Result<Vec<Employee>, SchedulingError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, full_name, gender, is_active FROM employees ORDER BY full_name ASC",
        )?;
        let employees = stmt
            .query_map([], employee_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(employees)
    }

    pub fn assign_service(&self, request: AssignServiceRequest) -> Result<(), SchedulingError> {
        self.get_employee(request.employee_id)?;
        self.db.conn().execute(
            "INSERT INTO employee_services (employee_id, service_id, is_active)
             VALUES (?1, ?2, 1)
             ON CONFLICT(employee_id, service_id) DO UPDATE SET is_active = 1",
            params![request.employee_id.to_string(), request.service_id.to_string()],
        )?;
        debug!(
            "employee {} assigned to service {}",
            request.employee_id, request.service_id
        );
        Ok(())
    }

    pub fn unassign_service(&self, request: AssignServiceRequest) -> Result<(), SchedulingError> {
        self.db.conn().execute(
            "UPDATE employee_services SET is_active = 0
             WHERE employee_id = ?1 AND service_id = ?2",
            params![request.employee_id.to_string(), request.service_id.to_string()],
        )?;
        Ok(())
    }

    /// The resource pool for a booking: employees with an active assignment
    /// for the service, filtered by gender when a preference is set. Ordered
    /// by id so downstream tie-breaks are deterministic.
    pub fn eligible_employees(
        &self,
        service_id: Uuid,
        preference: GenderPreference,
    ) -> Result<Vec<Employee>, SchedulingError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.full_name, e.gender, e.is_active
             FROM employees e
             JOIN employee_services es ON es.employee_id = e.id
             WHERE es.service_id = ?1 AND es.is_active = 1 AND e.is_active = 1
             ORDER BY e.id ASC",
        )?;
        let employees = stmt
            .query_map(params![service_id.to_string()], employee_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|e| preference.matches(e.gender))
            .collect();
        Ok(employees)
    }
}

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    let gender: String = row.get(2)?;
    Ok(Employee {
        id: parse_uuid(0, row.get(0)?)?,
        full_name: row.get(1)?,
        gender: Gender::parse(&gender),
        is_active: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_database::Db;
    use shared_utils::test_utils::seed_service;

    fn setup() -> (Db, StaffService, Uuid) {
        let db = Db::open_in_memory().unwrap();
        let service_id = seed_service(&db, "Home nursing", 60, 800.0);
        (db.clone(), StaffService::new(db), service_id)
    }

    fn hire(staff: &StaffService, name: &str, gender: Gender, service_id: Uuid) -> Employee {
        let employee = staff
            .create_employee(CreateEmployeeRequest {
                full_name: name.to_string(),
                gender,
            })
            .unwrap();
        staff
            .assign_service(AssignServiceRequest {
                employee_id: employee.id,
                service_id,
            })
            .unwrap();
        employee
    }

    #[test]
    fn pool_filters_by_gender_preference() {
        let (_db, staff, service_id) = setup();
        let anna = hire(&staff, "Anna", Gender::Female, service_id);
        let boris = hire(&staff, "Boris", Gender::Male, service_id);

        let all = staff
            .eligible_employees(service_id, GenderPreference::NoPreference)
            .unwrap();
        assert_eq!(all.len(), 2);

        let women = staff
            .eligible_employees(service_id, GenderPreference::Female)
            .unwrap();
        assert_eq!(women.len(), 1);
        assert_eq!(women[0].id, anna.id);

        let men = staff
            .eligible_employees(service_id, GenderPreference::Male)
            .unwrap();
        assert_eq!(men.len(), 1);
        assert_eq!(men[0].id, boris.id);
    }

    #[test]
    fn inactive_assignment_drops_employee_from_pool() {
        let (_db, staff, service_id) = setup();
        let anna = hire(&staff, "Anna", Gender::Female, service_id);

        staff
            .unassign_service(AssignServiceRequest {
                employee_id: anna.id,
                service_id,
            })
            .unwrap();

        let pool = staff
            .eligible_employees(service_id, GenderPreference::NoPreference)
            .unwrap();
        assert!(pool.is_empty());
    }

    #[test]
    fn unqualified_employee_is_not_eligible() {
        let (db, staff, service_id) = setup();
        let other_service = seed_service(&db, "Elder care", 120, 1500.0);
        hire(&staff, "Anna", Gender::Female, other_service);

        let pool = staff
            .eligible_employees(service_id, GenderPreference::NoPreference)
            .unwrap();
        assert!(pool.is_empty());
    }
}
