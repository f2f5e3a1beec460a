pub mod due_selection;
pub mod entities;
pub mod renewal_date;
