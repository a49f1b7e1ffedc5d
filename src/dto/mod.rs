//! DTOs de la API y del protocolo del solver

pub mod route_dto;
pub mod solver_dto;
