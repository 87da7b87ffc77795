pub mod aprendiz;
pub mod archivo;
pub mod ficha;
