// [apps/robot-agent/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ROBOT AGENT LIBRARY ROOT (V4.0 - SOLDIER SHELL)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: MOTOR DE MISIONES Y COSTURA DEL EJECUTOR
 * =================================================================
 */

pub mod engine;
pub mod runner;

pub use engine::RobotEngine;
pub use runner::{SimulatedWorkflowRunner, WorkflowFault, WorkflowRunner};
