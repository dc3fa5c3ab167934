//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则 (validator derive): 非空字符串、interval_ms > 0
//! - driver 名称唯一，sensor id 唯一
//! - sensor 引用的 driver 必须存在
//! - frequency_hz > 0
//! - driver 的 table_definition 必须可解析

use std::collections::HashSet;

use contracts::{ContractError, IngestBlueprint, TableDefinition};
use validator::Validate;

/// 校验 IngestBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &IngestBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_driver_names(blueprint)?;
    validate_driver_definitions(blueprint)?;
    validate_sensor_ids(blueprint)?;
    validate_sensor_drivers(blueprint)?;
    validate_sensor_frequencies(blueprint)?;
    Ok(())
}

/// 字段级规则
fn validate_fields(blueprint: &IngestBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// 校验 driver 名称唯一性
fn validate_driver_names(blueprint: &IngestBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for driver in &blueprint.drivers {
        if !seen.insert(driver.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("drivers[name={}]", driver.name),
                "duplicate driver name",
            ));
        }
    }
    Ok(())
}

/// 校验 table_definition 文档
fn validate_driver_definitions(blueprint: &IngestBlueprint) -> Result<(), ContractError> {
    for driver in &blueprint.drivers {
        TableDefinition::from_document(&driver.table_definition).map_err(|e| {
            ContractError::config_validation(
                format!("drivers[{}].table_definition", driver.name),
                e.to_string(),
            )
        })?;
    }
    Ok(())
}

/// 校验 sensor id 唯一性
fn validate_sensor_ids(blueprint: &IngestBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sensor in &blueprint.sensors {
        if !seen.insert(sensor.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("sensors[id={}]", sensor.id),
                "duplicate sensor id",
            ));
        }
    }
    Ok(())
}

/// 校验 sensor -> driver 引用
fn validate_sensor_drivers(blueprint: &IngestBlueprint) -> Result<(), ContractError> {
    for sensor in &blueprint.sensors {
        if blueprint.driver(&sensor.driver).is_none() {
            return Err(ContractError::config_validation(
                format!("sensors[{}].driver", sensor.id),
                format!("driver '{}' is not declared", sensor.driver),
            ));
        }
    }
    Ok(())
}

/// 校验传感器采样率
fn validate_sensor_frequencies(blueprint: &IngestBlueprint) -> Result<(), ContractError> {
    for sensor in &blueprint.sensors {
        if !(sensor.frequency_hz > 0.0 && sensor.frequency_hz.is_finite()) {
            return Err(ContractError::config_validation(
                format!("sensors[{}].frequency_hz", sensor.id),
                format!("frequency_hz must be > 0, got {}", sensor.frequency_hz),
            ));
        }
    }
    Ok(())
}
