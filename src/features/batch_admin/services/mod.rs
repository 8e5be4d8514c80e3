mod batch_admin_service;

pub use batch_admin_service::BatchAdminService;
