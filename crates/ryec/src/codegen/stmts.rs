//! Statement emission. Statements consume the value stack; the stack is
//! empty again when each one finishes.

use crate::ast::{StmtId, StmtKind};
use crate::diagnostics::{Diagnostic, DiagnosticResult};

use super::types::{self, pointer, LlvmType};
use super::{CodeGen, Handler};

impl<'p> CodeGen<'p> {
    pub(crate) fn visit_stmt(&mut self, stmt: StmtId) -> DiagnosticResult<()> {
        match &self.program.stmt(stmt).kind {
            StmtKind::Assignment { left, right } => {
                let (left, right) = (*left, *right);
                // The right side must not observe mutations by the left:
                // RHS emits first.
                self.visit_expr(right)?;
                self.visit_expr(left)?;
                let target = self.pop_value();
                let source = self.pop_value();
                self.assign(&target, &source)
            }
            StmtKind::Unpack {
                tmp_assign,
                field_assigns,
                ..
            } => {
                let tmp_assign = *tmp_assign;
                let field_assigns = field_assigns.clone();
                self.visit_stmt(tmp_assign)?;
                for fa in field_assigns {
                    self.visit_stmt(fa)?;
                }
                Ok(())
            }
            StmtKind::Conditional {
                condition,
                then_block,
                else_block,
            } => {
                let (condition, then_block, else_block) = (*condition, *then_block, *else_block);
                let prefix = self.create_label_prefix("if");
                let if_true = format!("{}.true", prefix);
                let if_false = format!("{}.false", prefix);
                let if_end = format!("{}.end", prefix);

                self.visit_expr(condition)?;
                let cond = self.pop_value();
                self.branch_on(&cond, &if_true, &if_false);

                self.contexts.active().label(if_true);
                self.visit_block(then_block)?;
                self.contexts.active().branch(&if_end);

                self.contexts.active().label(if_false);
                self.visit_block(else_block)?;
                self.contexts.active().branch(&if_end);

                self.contexts.active().label(if_end);
                Ok(())
            }
            StmtKind::While { condition, body } => {
                let (condition, body) = (*condition, *body);
                let prefix = self.create_label_prefix("while");
                self.loop_labels.insert(stmt, prefix.clone());
                let cond_label = format!("{}.condition", prefix);
                let block_label = format!("{}.block", prefix);
                let end_label = format!("{}.end", prefix);

                self.contexts.active().branch(&cond_label);
                self.contexts.active().label(cond_label.clone());
                self.visit_expr(condition)?;
                let cond = self.pop_value();
                self.branch_on(&cond, &block_label, &end_label);

                self.contexts.active().label(block_label);
                self.visit_block(body)?;
                self.contexts.active().branch(&cond_label);
                self.contexts.active().label(end_label);
                Ok(())
            }
            StmtKind::Break { loop_stmt } => {
                let target = self.loop_label_of(*loop_stmt, stmt)?;
                self.contexts.active().branch(&format!("{}.end", target));
                Ok(())
            }
            StmtKind::Skip { loop_stmt } => {
                let target = self.loop_label_of(*loop_stmt, stmt)?;
                self.contexts
                    .active()
                    .branch(&format!("{}.condition", target));
                Ok(())
            }
            StmtKind::Return { value } => {
                let value = *value;
                match value {
                    Some(v) => {
                        self.visit_expr(v)?;
                        let operand = self.pop_value();
                        self.emit_return_value(&operand)
                    }
                    None => {
                        self.contexts.active().terminator("ret void");
                        Ok(())
                    }
                }
            }
            StmtKind::Yield { value, index } => {
                let (value, index) = (*value, *index);
                self.visit_expr(value)?;
                // Arm the resume label, return the yielded Just, then
                // open the label the next getNext call lands on.
                let class = self
                    .current_function
                    .last()
                    .and_then(|f| self.program.function(*f).defining_class)
                    .ok_or_else(|| Diagnostic::error("yield outside a generator body"))?;
                let label = format!("yield{}", index);
                self.set_generator_label(class, &label)?;
                let operand = self.pop_value();
                self.emit_return_value(&operand)?;
                self.contexts.active().label(label);
                Ok(())
            }
            StmtKind::Raise { value } => {
                let value = *value;
                let raised = match value {
                    Some(v) => {
                        self.visit_expr(v)?;
                        let operand = self.pop_value();
                        Some(self.resolve_value(&operand))
                    }
                    None => None,
                };
                match self.handler_stack.last() {
                    Some(handler) => {
                        let label = handler.label.clone();
                        let slot = handler.slot.clone();
                        let object = match raised {
                            Some(v) => self.bitcast_to(&v, &slot.ty),
                            None => super::LlvmIdentifier::new("null", slot.ty.clone(), false),
                        };
                        self.contexts.active().append(format!(
                            "store {}, {}* {}",
                            object.typed(),
                            slot.ty,
                            slot.name
                        ));
                        self.contexts.active().branch(&label);
                        Ok(())
                    }
                    None => {
                        let operand = match raised {
                            Some(v) => {
                                let i8ptr = pointer(LlvmType::Int8);
                                self.bitcast_to(&v, &i8ptr).name
                            }
                            None => "null".to_string(),
                        };
                        self.contexts
                            .active()
                            .append(format!("call void @rye_raise(i8* {})", operand));
                        self.contexts.active().terminator("unreachable");
                        Ok(())
                    }
                }
            }
            StmtKind::Try {
                error,
                try_block,
                handle_block,
            } => {
                let (error, try_block, handle_block) = (*error, *try_block, *handle_block);
                let prefix = self.create_label_prefix("try");
                let handler_label = format!("{}.handler", prefix);
                let end_label = format!("{}.end", prefix);

                let object_struct = self.ensure_struct(self.core.object, &[]);
                let slot_ty = pointer(LlvmType::Named(object_struct));
                let slot = self
                    .idents
                    .local(&format!("{}.slot", prefix), slot_ty.clone(), true);
                self.contexts
                    .active()
                    .append(format!("{} = alloca {}", slot.name, slot_ty));

                self.handler_stack.push(Handler {
                    label: handler_label.clone(),
                    slot: slot.clone(),
                });
                let try_result = self.visit_block(try_block);
                self.handler_stack.pop();
                try_result?;
                self.contexts.active().branch(&end_label);

                self.contexts.active().label(handler_label);
                // Bind the handled value.
                let err_ty = self
                    .program
                    .variable(error)
                    .ty
                    .clone()
                    .ok_or_else(|| Diagnostic::error("handler variable has no resolved type"))?;
                let err_ir = self.map_ty(&err_ty);
                let err_name = self
                    .program
                    .variable(error)
                    .identifier
                    .name
                    .trim_start_matches('$')
                    .to_string();
                let err_local = self.idents.local(&err_name, err_ir.clone(), true);
                self.contexts
                    .active()
                    .append(format!("{} = alloca {}", err_local.name, err_ir));
                self.bind_local(error, err_local.clone());
                let raised = self.resolve_value(&slot);
                let raised = self.bitcast_to(&raised, &err_ir);
                self.contexts.active().append(format!(
                    "store {}, {}* {}",
                    raised.typed(),
                    err_ir,
                    err_local.name
                ));
                self.visit_block(handle_block)?;
                self.contexts.active().branch(&end_label);

                self.contexts.active().label(end_label);
                Ok(())
            }
            StmtKind::Call { call } => {
                let call = *call;
                self.visit_expr(call)?;
                // A call used as a statement discards its value.
                self.stack.pop();
                Ok(())
            }
        }
    }

    pub(crate) fn pop_value(&mut self) -> super::LlvmIdentifier {
        self.stack
            .pop()
            .unwrap_or_else(|| panic!("value stack underflow"))
    }

    fn loop_label_of(
        &self,
        loop_stmt: Option<StmtId>,
        at: StmtId,
    ) -> DiagnosticResult<String> {
        let loop_stmt = loop_stmt.ok_or_else(|| {
            Diagnostic::error_at(
                &self.program.stmt(at).position,
                "break or skip outside of a loop",
            )
        })?;
        match self.loop_labels.get(&loop_stmt) {
            Some(prefix) => Ok(prefix.clone()),
            None => panic!("enclosing loop has no label prefix"),
        }
    }

    /// `ret` with the value coerced to the function's return IR type.
    fn emit_return_value(&mut self, operand: &super::LlvmIdentifier) -> DiagnosticResult<()> {
        let function = *self
            .current_function
            .last()
            .ok_or_else(|| Diagnostic::error("return outside a function"))?;
        let f = self.program.function(function);
        let defining = f.defining_class;
        let ret = f
            .return_ty
            .clone()
            .ok_or_else(|| Diagnostic::error("value return in a procedure"))?;
        let variation = defining
            .map(|c| {
                self.variation_stack
                    .iter()
                    .rev()
                    .find(|(cl, _)| *cl == c)
                    .map(|(_, a)| a.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default();
        let substituted = match defining {
            Some(class) => types::subst_ty(&ret, class, &variation),
            None => ret,
        };
        let ret_ir = self.map_ty(&substituted);
        let value = self.resolve_value(operand);
        let value = self.bitcast_to(&value, &ret_ir);
        self.contexts
            .active()
            .terminator(format!("ret {}", value.typed()));
        Ok(())
    }
}
