pub mod aprendices;
pub mod fichas;
pub mod formatos;
